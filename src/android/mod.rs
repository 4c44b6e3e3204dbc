pub mod apk;
pub mod binary_xml;
pub mod chunk;
pub mod dispatch;
pub mod error;
pub mod printer;
pub mod resolver;
pub mod value;

pub use apk::ApkArchive;
pub use binary_xml::{decode_xml, decode_xml_with, reconstruct_xml};
pub use error::{AxmlError, AxmlResult};
pub use resolver::{NoResolution, ResourceIdResolver};
