//! Item-list file loader: parses an XML item list into dense, stream-id
//! ordered records via `quick-xml` pull-parsing.

use perfcore_items::ItemRecord;
use quick_xml::Reader;
use quick_xml::events::Event;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("failed to read item file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("malformed XML at byte {0}: {1}")]
    Xml(usize, quick_xml::Error),
    #[error("item at byte {0} is missing a required '{1}' attribute")]
    MissingAttribute(usize, &'static str),
    #[error("item '{0}' name exceeds 255 characters")]
    NameTooLong(String),
    #[error("item '{0}' cannot be both posting and snapshot")]
    PostingWithSnapshot(String),
    #[error("item '{0}' cannot be both generic and snapshot")]
    GenericWithSnapshot(String),
}

/// Loads and validates an item-list file (§6.2), assigning a dense
/// `stream_id` starting at `start` in file order — the registry never
/// re-derives this mapping, the loader is the single place it happens.
pub fn load_item_file(path: &str, start: u32) -> Result<Vec<ItemRecord>, LoaderError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Read {
        path: path.to_string(),
        source,
    })?;
    parse_item_list(&text, start)
}

fn attr_value(
    tag: &quick_xml::events::BytesStart,
    pos: usize,
    key: &'static str,
) -> Result<Option<String>, LoaderError> {
    for attr in tag.attributes() {
        let attr = attr.map_err(|e| LoaderError::Xml(pos, e.into()))?;
        if attr.key.as_ref() == key.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| LoaderError::Xml(pos, e))?
                .into_owned();
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn parse_item_list(text: &str, start: u32) -> Result<Vec<ItemRecord>, LoaderError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut next_id = start;

    loop {
        let pos = reader.buffer_position() as usize;
        match reader.read_event().map_err(|e| LoaderError::Xml(pos, e))? {
            Event::Eof => break,
            Event::Empty(tag) | Event::Start(tag) if tag.name().as_ref() == b"item" => {
                let domain = attr_value(&tag, pos, "domain")?
                    .ok_or(LoaderError::MissingAttribute(pos, "domain"))?;
                let name = attr_value(&tag, pos, "name")?
                    .ok_or(LoaderError::MissingAttribute(pos, "name"))?;
                if name.len() > 255 {
                    return Err(LoaderError::NameTooLong(name));
                }
                let post = attr_value(&tag, pos, "post")?.is_some_and(|v| v == "true");
                let generic = attr_value(&tag, pos, "generic")?.is_some_and(|v| v == "true");
                let snapshot = attr_value(&tag, pos, "snapshot")?.is_some_and(|v| v == "true");

                if post && snapshot {
                    return Err(LoaderError::PostingWithSnapshot(name));
                }
                if generic && snapshot {
                    return Err(LoaderError::GenericWithSnapshot(name));
                }

                let mut record = ItemRecord::new(next_id, domain, name);
                record.is_post = post;
                record.is_generic = generic;
                records.push(record);
                next_id += 1;
            }
            _ => {}
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <itemList>
          <item domain="MarketPrice" name="ITEM_A" post="true" />
          <item domain="MarketPrice" name="ITEM_B" generic="true" />
          <item domain="MarketByOrder" name="ITEM_C" />
        </itemList>
    "#;

    #[test]
    fn parses_items_in_order_with_dense_stream_ids() {
        let records = parse_item_list(SAMPLE, 100).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].stream_id, 100);
        assert_eq!(records[0].name, "ITEM_A");
        assert!(records[0].is_post);
        assert_eq!(records[1].stream_id, 101);
        assert!(records[1].is_generic);
        assert_eq!(records[2].domain, "MarketByOrder");
    }

    #[test]
    fn posting_and_snapshot_together_is_rejected() {
        let xml = r#"<itemList><item domain="MarketPrice" name="X" post="true" snapshot="true"/></itemList>"#;
        assert!(matches!(
            parse_item_list(xml, 0),
            Err(LoaderError::PostingWithSnapshot(_))
        ));
    }

    #[test]
    fn generic_and_snapshot_together_is_rejected() {
        let xml = r#"<itemList><item domain="MarketPrice" name="X" generic="true" snapshot="true"/></itemList>"#;
        assert!(matches!(
            parse_item_list(xml, 0),
            Err(LoaderError::GenericWithSnapshot(_))
        ));
    }

    #[test]
    fn missing_name_attribute_errors() {
        let xml = r#"<itemList><item domain="MarketPrice"/></itemList>"#;
        assert!(matches!(
            parse_item_list(xml, 0),
            Err(LoaderError::MissingAttribute(_, "name"))
        ));
    }
}
