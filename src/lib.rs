//! # axml
//!
//! A library for decoding Android binary XML (the compiled form of `AndroidManifest.xml`
//! and layout resources) back into readable text XML.
//!
//! ```no_run
//!  use axml::ApkArchive;
//!
//!  let apk = ApkArchive::from_file("app.apk").unwrap();
//!  let manifest = apk.manifest().unwrap();
//!  println!("{}", String::from_utf8_lossy(&manifest));
//! ```
//!
//! Resource references print as `@ref/0x<id>` unless a [`ResourceIdResolver`] is
//! supplied to [`decode_xml_with`].

pub mod android;

pub use android::{
    decode_xml, decode_xml_with, reconstruct_xml, ApkArchive, AxmlError, AxmlResult,
    NoResolution, ResourceIdResolver,
};
