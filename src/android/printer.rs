use crate::android::chunk::{NamespaceChunk, StartElementChunk, StringPool, XmlAttribute};
use crate::android::dispatch::{XmlChunkHandler, XmlNode};
use crate::android::error::{AxmlError, AxmlResult};
use crate::android::resolver::ResourceIdResolver;
use crate::android::value::format_value;
use log::warn;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};

const XMLNS: &str = "xmlns";
const INDENT_SIZE: usize = 4;

/// A namespace URI and the prefix it was declared with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceBinding {
    pub uri: String,
    pub prefix: String,
}

/// Writes indented XML, holding each start tag back until its first child or its end
/// tag arrives so that childless elements come out self-closing.
struct XmlBuilder {
    writer: Writer<Vec<u8>>,
    open: Option<BytesStart<'static>>,
}

impl XmlBuilder {
    fn new() -> Self {
        XmlBuilder {
            writer: Writer::new_with_indent(Vec::new(), b' ', INDENT_SIZE),
            open: None,
        }
    }

    fn start_tag(&mut self, name: &str) -> AxmlResult<()> {
        self.flush_open()?;
        self.open = Some(BytesStart::new(name.to_owned()));
        Ok(())
    }

    fn namespace(&mut self, prefix: &str, uri: &str) {
        if prefix.is_empty() {
            self.push_attribute(XMLNS, uri);
        } else {
            self.push_attribute(&format!("{XMLNS}:{prefix}"), uri);
        }
    }

    fn attribute(&mut self, prefix: &str, name: &str, value: &str) {
        if prefix.is_empty() {
            self.push_attribute(name, value);
        } else {
            self.push_attribute(&format!("{prefix}:{name}"), value);
        }
    }

    fn push_attribute(&mut self, key: &str, value: &str) {
        match self.open.as_mut() {
            Some(start) => start.push_attribute((key, value)),
            None => warn!("Dropping attribute {key} outside of a start tag"),
        }
    }

    /// Closes the innermost open tag; names are not checked against the open tags.
    fn end_tag(&mut self, name: &str) -> AxmlResult<()> {
        match self.open.take() {
            Some(start) if start.name().as_ref() == name.as_bytes() => {
                self.writer.write_event(Event::Empty(start))?;
            }
            Some(start) => {
                self.writer.write_event(Event::Start(start))?;
                self.writer
                    .write_event(Event::End(BytesEnd::new(name.to_owned())))?;
            }
            None => {
                self.writer
                    .write_event(Event::End(BytesEnd::new(name.to_owned())))?;
            }
        }
        Ok(())
    }

    fn flush_open(&mut self) -> AxmlResult<()> {
        if let Some(start) = self.open.take() {
            self.writer.write_event(Event::Start(start))?;
        }
        Ok(())
    }

    fn finish(mut self) -> AxmlResult<String> {
        self.flush_open()?;
        String::from_utf8(self.writer.into_inner()).map_err(|err| AxmlError::Xml(err.to_string()))
    }
}

/// Rebuilds the text of one XML document from its node chunks.
///
/// Namespace declarations are collected as they are seen and all written onto the
/// first element that follows them. Ending a namespace scope does not remove the
/// binding, so later elements keep using its prefix.
pub struct XmlPrinter<'a, R: ?Sized> {
    builder: XmlBuilder,
    namespaces: Vec<NamespaceBinding>,
    namespaces_added: bool,
    string_pool: Option<&'a StringPool>,
    resolver: &'a R,
}

impl<'a, R> XmlPrinter<'a, R>
where
    R: ResourceIdResolver + ?Sized,
{
    pub fn new(resolver: &'a R) -> Self {
        XmlPrinter {
            builder: XmlBuilder::new(),
            namespaces: Vec::new(),
            namespaces_added: false,
            string_pool: None,
            resolver,
        }
    }

    /// Bindings seen so far, in declaration order.
    pub fn namespaces(&self) -> &[NamespaceBinding] {
        &self.namespaces
    }

    /// The document body written so far; tags still open stay unclosed.
    pub fn into_xml(self) -> AxmlResult<String> {
        self.builder.finish()
    }

    fn string(&self, index: Option<u32>) -> Option<&'a str> {
        self.string_pool?.get(index?)
    }

    fn name(&self, index: u32, kind: &str) -> &'a str {
        self.string(Some(index)).unwrap_or_else(|| {
            warn!("{kind} name references missing string {index}");
            ""
        })
    }

    fn start_namespace(&mut self, chunk: &NamespaceChunk) {
        let uri = self.string(chunk.uri).unwrap_or_default();
        let prefix = self.string(chunk.prefix).unwrap_or_default();
        match self.namespaces.iter_mut().find(|binding| binding.uri == uri) {
            Some(binding) => binding.prefix = prefix.to_string(),
            None => self.namespaces.push(NamespaceBinding {
                uri: uri.to_string(),
                prefix: prefix.to_string(),
            }),
        }
    }

    fn start_element(&mut self, chunk: &StartElementChunk) -> AxmlResult<()> {
        let name = self.name(chunk.name, "Element");
        self.builder.start_tag(name)?;

        if !self.namespaces_added && !self.namespaces.is_empty() {
            self.namespaces_added = true;
            for binding in &self.namespaces {
                self.builder.namespace(&binding.prefix, &binding.uri);
            }
        }

        for attribute in &chunk.attributes {
            let prefix = self
                .string(attribute.namespace)
                .and_then(|uri| prefix_for(&self.namespaces, uri))
                .unwrap_or("");
            let name = self.name(attribute.name, "Attribute");
            let value = self.attribute_value(attribute);
            self.builder.attribute(prefix, name, &value);
        }
        Ok(())
    }

    /// A non-empty raw string wins over the typed value.
    fn attribute_value(&self, attribute: &XmlAttribute) -> String {
        match self.string(attribute.raw_value) {
            Some(raw) if !raw.is_empty() => raw.to_string(),
            _ => format_value(&attribute.typed_value, self.string_pool, self.resolver),
        }
    }
}

impl<'a, R> XmlChunkHandler<'a> for XmlPrinter<'a, R>
where
    R: ResourceIdResolver + ?Sized,
{
    fn handle(&mut self, node: XmlNode<'a>) -> AxmlResult<()> {
        match node {
            XmlNode::StringPool(pool) => self.string_pool = Some(pool),
            XmlNode::ResourceMap(_) => {}
            XmlNode::StartNamespace(chunk) => self.start_namespace(chunk),
            XmlNode::EndNamespace(_) => {}
            XmlNode::StartElement(chunk) => self.start_element(chunk)?,
            XmlNode::EndElement(chunk) => {
                let name = self.name(chunk.name, "Element");
                self.builder.end_tag(name)?;
            }
        }
        Ok(())
    }
}

fn prefix_for<'n>(namespaces: &'n [NamespaceBinding], uri: &str) -> Option<&'n str> {
    namespaces
        .iter()
        .find(|binding| binding.uri == uri)
        .map(|binding| binding.prefix.as_str())
}
