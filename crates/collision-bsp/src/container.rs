//! Named-section container that mesh files embed trees in.
//!
//! ```text
//! magic u32 (0x42a14e65)
//! blobs      each section's bytes, zero padded to a multiple of 4
//! index      per section: blob length u32, preload length u32,
//!            version u32, modified u64, name length u32,
//!            name bytes zero padded to a multiple of 4
//! index length u32 (last four bytes)
//! ```
//!
//! Sections appear in the index in the same order as their blobs.

use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::format::ByteReader;

pub const CONTAINER_MAGIC: u32 = 0x42a1_4e65;

/// Current tree section. Its triangles carry placeholder material indices.
pub const SECTION_BSP2: &str = "bsp2";
/// Legacy tree section with final flags.
pub const SECTION_BSP: &str = "bsp";
/// Material ids for remapping a `bsp2` tree.
pub const SECTION_MATERIALS: &str = "bsp2_materials";

#[inline]
fn padded(len: usize) -> usize {
    (len + 3) & !3
}

/// One named blob of a [`SectionContainer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
    pub preload_len: u32,
    pub version: u32,
    pub modified: u64,
}

/// A parsed container borrowing the bytes it was read from.
#[derive(Debug, Clone, Default)]
pub struct SectionContainer<'a> {
    sections: Vec<Section<'a>>,
}

impl<'a> SectionContainer<'a> {
    /// True if `data` starts with the container magic.
    pub fn is_container(data: &[u8]) -> bool {
        data.get(..4)
            .is_some_and(|m| u32::from_le_bytes([m[0], m[1], m[2], m[3]]) == CONTAINER_MAGIC)
    }

    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if !Self::is_container(data) {
            return Err(Error::Container("missing magic".into()));
        }
        if data.len() < 8 {
            return Err(Error::Container("no index length".into()));
        }

        let tail = data.len() - 4;
        let index_len = ByteReader::new(&data[tail..]).u32()? as usize;
        if index_len > tail - 4 {
            return Err(Error::Container(format!(
                "index length {index_len} exceeds file size {}",
                data.len()
            )));
        }
        let index_start = tail - index_len;

        let mut index = ByteReader::new(&data[index_start..tail]);
        let mut offset = 4usize;
        let mut sections = Vec::new();

        while index.remaining() > 0 {
            let blob_len = index.u32()? as usize;
            let preload_len = index.u32()?;
            let version = index.u32()?;
            let modified = index.u64()?;
            let name_len = index.u32()? as usize;
            let name = index.take(name_len)?;
            index.take(padded(name_len) - name_len)?;

            let name = std::str::from_utf8(name)
                .map_err(|e| Error::Container(format!("section name: {e}")))?;

            let end = offset + blob_len;
            if end > index_start {
                return Err(Error::Container(format!(
                    "section `{name}` runs past the index ({end} > {index_start})"
                )));
            }

            sections.push(Section {
                name,
                data: &data[offset..end],
                preload_len,
                version,
                modified,
            });
            offset += padded(blob_len);
        }

        Ok(Self { sections })
    }

    pub fn section(&self, name: &str) -> Option<&Section<'a>> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Data of the named section, or [`Error::MissingSection`].
    pub fn require(&self, name: &str) -> Result<&'a [u8]> {
        self.section(name)
            .map(|s| s.data)
            .ok_or_else(|| Error::MissingSection(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.sections.iter().map(|s| s.name)
    }

    pub fn sections(&self) -> &[Section<'a>] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Writes the container layout read by [`SectionContainer::parse`].
#[derive(Debug, Clone, Default)]
pub struct SectionContainerBuilder {
    sections: Vec<(String, Vec<u8>, u32, u64)>,
}

impl SectionContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.versioned_section(name, data, 0, 0)
    }

    pub fn versioned_section(
        mut self,
        name: impl Into<String>,
        data: Vec<u8>,
        version: u32,
        modified: u64,
    ) -> Self {
        self.sections.push((name.into(), data, version, modified));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = CONTAINER_MAGIC.to_le_bytes().to_vec();

        for (_, data, _, _) in &self.sections {
            out.extend_from_slice(data);
            out.resize(padded(out.len()), 0);
        }

        let index_start = out.len();
        for (name, data, version, modified) in &self.sections {
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&version.to_le_bytes());
            out.extend_from_slice(&modified.to_le_bytes());
            out.extend_from_slice(&(name.len() as u32).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.resize(padded(out.len()), 0);
        }

        let index_len = (out.len() - index_start) as u32;
        out.extend_from_slice(&index_len.to_le_bytes());
        out
    }
}

/// Material identifiers listed in placeholder-index order.
///
/// Stored as an XML document whose `<id>` elements hold one identifier
/// each; everything else in the document is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialIds(pub Vec<String>);

impl MaterialIds {
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();
        let mut ids = Vec::new();
        let mut current: Option<String> = None;

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|e| Error::MaterialIds(e.to_string()))?
            {
                Event::Start(e) if e.name().as_ref() == b"id" => current = Some(String::new()),
                Event::Empty(e) if e.name().as_ref() == b"id" => ids.push(String::new()),
                Event::Text(t) => {
                    if let Some(id) = current.as_mut() {
                        let text = t.unescape().map_err(|e| Error::MaterialIds(e.to_string()))?;
                        id.push_str(&text);
                    }
                }
                Event::CData(t) => {
                    if let Some(id) = current.as_mut() {
                        id.push_str(&String::from_utf8_lossy(&t));
                    }
                }
                Event::End(e) if e.name().as_ref() == b"id" => {
                    if let Some(id) = current.take() {
                        ids.push(id.trim().to_string());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if current.is_some() {
            return Err(Error::MaterialIds("unterminated <id>".into()));
        }

        Ok(Self(ids))
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<bsp2_materials>\n");
        for id in &self.0 {
            let escaped: Cow<'_, str> = quick_xml::escape::escape(id.as_str());
            xml.push_str("\t<id>");
            xml.push_str(&escaped);
            xml.push_str("</id>\n");
        }
        xml.push_str("</bsp2_materials>\n");
        xml
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
