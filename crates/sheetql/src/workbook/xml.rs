//! quick-xml helpers shared by the workbook part parsers.

use quick_xml::Reader;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesCData, BytesRef, BytesStart, BytesText};

use super::xlsx::XlsxError;

pub(crate) fn reader(bytes: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(bytes);
    let config = reader.config_mut();
    config.check_comments = false;
    config.check_end_names = false;
    config.expand_empty_elements = true;
    config.trim_text(false);
    reader
}

/// Attribute value by local name, so `r:id` matches `id`.
pub(crate) fn attribute(event: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, XlsxError> {
    for attribute in event.attributes() {
        let attribute = attribute.map_err(XlsxError::xml)?;
        if attribute.key.local_name().as_ref() == name {
            let value = attribute.unescape_value().map_err(XlsxError::xml)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

pub(crate) fn push_text(buffer: &mut String, text: &BytesText<'_>) -> Result<(), XlsxError> {
    buffer.push_str(&text.xml_content().map_err(XlsxError::xml)?);
    Ok(())
}

pub(crate) fn push_cdata(buffer: &mut String, text: &BytesCData<'_>) -> Result<(), XlsxError> {
    buffer.push_str(&text.xml_content().map_err(XlsxError::xml)?);
    Ok(())
}

/// Appends an entity or character reference such as `&amp;` or `&#10;`.
pub(crate) fn push_reference(buffer: &mut String, reference: &BytesRef<'_>) -> Result<(), XlsxError> {
    let raw = reference.xml_content().map_err(XlsxError::xml)?;
    if let Some(number) = raw.strip_prefix('#') {
        let code = match number.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => number.parse::<u32>(),
        }
        .map_err(|_| XlsxError::BadReference(raw.to_string()))?;
        if let Some(character) = char::from_u32(code) {
            buffer.push(character);
        }
    } else if let Some(entity) = resolve_xml_entity(&raw) {
        buffer.push_str(entity);
    } else {
        return Err(XlsxError::BadReference(raw.to_string()));
    }
    Ok(())
}
