use crate::android::binary_xml::decode_xml_with;
use crate::android::error::{AxmlError, AxmlResult};
use crate::android::resolver::{NoResolution, ResourceIdResolver};
use log::warn;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Component, Path};
use zip::read::ZipArchive;

/// Entry holding the compiled application manifest.
pub const MANIFEST_ENTRY: &str = "AndroidManifest.xml";

/// The file entries of an APK (ZIP) archive, loaded into memory.
///
/// Entries are keyed by their normalized `/`-separated name; directories are skipped.
pub struct ApkArchive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ApkArchive {
    /// Load an APK from disk.
    pub fn from_file(path: impl AsRef<Path>) -> AxmlResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> AxmlResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = BTreeMap::new();
        for idx in 0..archive.len() {
            let mut entry = archive.by_index(idx)?;
            if entry.is_dir() {
                continue;
            }
            let Some(name) = entry.enclosed_name().and_then(|path| path_to_entry_name(&path))
            else {
                warn!("Skipping archive entry with unsafe name {}", entry.name());
                continue;
            };
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            entries.insert(name, data);
        }
        Ok(ApkArchive { entries })
    }

    /// Entry names in sorted order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Names of the entries that may hold binary XML.
    pub fn xml_entries(&self) -> impl Iterator<Item = &str> {
        self.entry_names().filter(|name| name.ends_with(".xml"))
    }

    /// Decodes one binary XML entry. Entries that are not binary XML documents come
    /// back unchanged.
    pub fn decode_xml_entry<R>(&self, name: &str, resolver: &R) -> AxmlResult<Vec<u8>>
    where
        R: ResourceIdResolver + ?Sized,
    {
        let data = self
            .entry(name)
            .ok_or_else(|| AxmlError::MissingEntry(name.to_string()))?;
        decode_xml_with(data, resolver)
    }

    /// Decodes `AndroidManifest.xml`.
    pub fn manifest(&self) -> AxmlResult<Vec<u8>> {
        self.decode_xml_entry(MANIFEST_ENTRY, &NoResolution)
    }
}

fn path_to_entry_name(path: &Path) -> Option<String> {
    let mut components = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(part) => components.push(part.to_string_lossy().replace('\\', "/")),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) | Component::ParentDir => return None,
        }
    }
    (!components.is_empty()).then(|| components.join("/"))
}
