use crate::android::chunk::{parse_chunks, Chunk};
use crate::android::dispatch::visit_chunks;
use crate::android::error::AxmlResult;
use crate::android::printer::XmlPrinter;
use crate::android::resolver::{NoResolution, ResourceIdResolver};
use log::warn;

/// Declaration written ahead of every decoded document.
pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// Decodes a binary XML document, printing resource references as `@ref/0x<hex>`.
pub fn decode_xml(data: &[u8]) -> AxmlResult<Vec<u8>> {
    decode_xml_with(data, &NoResolution)
}

/// Decodes a binary XML document into UTF-8 text.
///
/// Input that is not exactly one XML document chunk is returned unchanged. Errors
/// from the chunk parser are propagated.
pub fn decode_xml_with<R>(data: &[u8], resolver: &R) -> AxmlResult<Vec<u8>>
where
    R: ResourceIdResolver + ?Sized,
{
    Ok(match reconstruct_xml(data, resolver)? {
        Some(text) => text.into_bytes(),
        None => data.to_vec(),
    })
}

/// Like [`decode_xml_with`], but returns `None` when the input is not a single XML
/// document instead of handing the bytes back.
pub fn reconstruct_xml<R>(data: &[u8], resolver: &R) -> AxmlResult<Option<String>>
where
    R: ResourceIdResolver + ?Sized,
{
    let chunks = parse_chunks(data)?;
    if chunks.len() != 1 {
        warn!("Expected 1 top-level chunk, but got {} chunks", chunks.len());
        return Ok(None);
    }
    let document = match &chunks[0] {
        Chunk::Xml(document) => document,
        other => {
            warn!(
                "Top-level chunk at offset {:#x} is not an XML chunk",
                other.offset()
            );
            return Ok(None);
        }
    };

    let mut printer = XmlPrinter::new(resolver);
    visit_chunks(&document.chunks, &mut printer)?;
    let body = printer.into_xml()?;
    Ok(Some(format!("{XML_HEADER}{body}")))
}
