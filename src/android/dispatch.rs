use crate::android::chunk::{
    Chunk, EndElementChunk, NamespaceChunk, ResourceMapChunk, StartElementChunk, StringPool,
};
use crate::android::error::AxmlResult;
use log::debug;
use std::collections::HashMap;

/// The chunk kinds an XML document handler reacts to.
#[derive(Clone, Copy, Debug)]
pub enum XmlNode<'c> {
    StringPool(&'c StringPool),
    ResourceMap(&'c ResourceMapChunk),
    StartNamespace(&'c NamespaceChunk),
    EndNamespace(&'c NamespaceChunk),
    StartElement(&'c StartElementChunk),
    EndElement(&'c EndElementChunk),
}

/// Receives the nodes of an XML document in file order.
pub trait XmlChunkHandler<'c> {
    fn handle(&mut self, node: XmlNode<'c>) -> AxmlResult<()>;
}

/// Orders offset-keyed chunks by their position in the file.
pub fn sort_by_offset<'c, I>(chunks: I) -> Vec<&'c Chunk>
where
    I: IntoIterator<Item = (&'c usize, &'c Chunk)>,
{
    let mut entries: Vec<_> = chunks.into_iter().collect();
    entries.sort_by_key(|(offset, _)| **offset);
    entries.into_iter().map(|(_, chunk)| chunk).collect()
}

/// Feeds every chunk to `handler` in ascending offset order.
///
/// Which namespaces are active and which string pool is current depend on file
/// position, so the map's own iteration order is never used. Chunks that carry no
/// XML structure (CDATA, nested documents, unknown types) are skipped.
pub fn visit_chunks<'c, H>(chunks: &'c HashMap<usize, Chunk>, handler: &mut H) -> AxmlResult<()>
where
    H: XmlChunkHandler<'c> + ?Sized,
{
    for chunk in sort_by_offset(chunks) {
        let node = match chunk {
            Chunk::StringPool(chunk) => XmlNode::StringPool(&chunk.pool),
            Chunk::ResourceMap(chunk) => XmlNode::ResourceMap(chunk),
            Chunk::NamespaceStart(chunk) => XmlNode::StartNamespace(chunk),
            Chunk::NamespaceEnd(chunk) => XmlNode::EndNamespace(chunk),
            Chunk::StartElement(chunk) => XmlNode::StartElement(chunk),
            Chunk::EndElement(chunk) => XmlNode::EndElement(chunk),
            Chunk::Cdata(_) | Chunk::Xml(_) | Chunk::Unknown { .. } => {
                debug!("XML node at offset {:#x} not handled", chunk.offset());
                continue;
            }
        };
        handler.handle(node)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::chunk::CdataChunk;
    use crate::android::value::{TypedValue, ValueType};

    #[derive(Default)]
    struct Recorder {
        seen: Vec<&'static str>,
    }

    impl<'c> XmlChunkHandler<'c> for Recorder {
        fn handle(&mut self, node: XmlNode<'c>) -> AxmlResult<()> {
            self.seen.push(match node {
                XmlNode::StringPool(_) => "pool",
                XmlNode::ResourceMap(_) => "resources",
                XmlNode::StartNamespace(_) => "start-ns",
                XmlNode::EndNamespace(_) => "end-ns",
                XmlNode::StartElement(_) => "start",
                XmlNode::EndElement(_) => "end",
            });
            Ok(())
        }
    }

    fn namespace(offset: usize) -> NamespaceChunk {
        NamespaceChunk {
            offset,
            line_number: 1,
            prefix: Some(0),
            uri: Some(1),
        }
    }

    fn element(offset: usize) -> StartElementChunk {
        StartElementChunk {
            offset,
            line_number: 2,
            namespace: None,
            name: 2,
            attributes: Vec::new(),
            id_index: 0,
            class_index: 0,
            style_index: 0,
        }
    }

    #[test]
    fn visits_in_offset_order() {
        let mut chunks = HashMap::new();
        chunks.insert(
            200,
            Chunk::EndElement(EndElementChunk {
                offset: 200,
                line_number: 2,
                namespace: None,
                name: 2,
            }),
        );
        chunks.insert(8, Chunk::StringPool(Default::default()));
        chunks.insert(240, Chunk::NamespaceEnd(namespace(240)));
        chunks.insert(120, Chunk::StartElement(element(120)));
        chunks.insert(96, Chunk::NamespaceStart(namespace(96)));
        chunks.insert(
            64,
            Chunk::ResourceMap(ResourceMapChunk {
                offset: 64,
                ids: vec![0x0101_0003],
            }),
        );

        let mut recorder = Recorder::default();
        visit_chunks(&chunks, &mut recorder).expect("visit");
        assert_eq!(
            recorder.seen,
            vec!["pool", "resources", "start-ns", "start", "end", "end-ns"]
        );
    }

    #[test]
    fn skips_chunks_without_structure() {
        let mut chunks = HashMap::new();
        chunks.insert(16, Chunk::StartElement(element(16)));
        chunks.insert(
            32,
            Chunk::Cdata(CdataChunk {
                offset: 32,
                line_number: 3,
                data: Some(4),
                typed_value: TypedValue::new(ValueType::String, 4),
            }),
        );
        chunks.insert(
            48,
            Chunk::Unknown {
                offset: 48,
                chunk_type: 0x0105,
            },
        );

        let mut recorder = Recorder::default();
        visit_chunks(&chunks, &mut recorder).expect("visit");
        assert_eq!(recorder.seen, vec!["start"]);
    }

    #[test]
    fn sorts_any_offset_map() {
        let mut chunks = HashMap::new();
        for offset in [300usize, 4, 77, 12] {
            chunks.insert(offset, Chunk::Unknown { offset, chunk_type: 0 });
        }
        let offsets: Vec<_> = sort_by_offset(&chunks).iter().map(|c| c.offset()).collect();
        assert_eq!(offsets, vec![4, 12, 77, 300]);
    }
}
