//! Message template file loader: parses an XML template file listing each
//! domain's refresh/update/post/generic templates and their estimated
//! encoded sizes, via `quick-xml` pull-parsing.
//!
//! The wire encoding itself is out of scope; this loader only produces
//! the size estimate `perfcore_items::Template` needs so a worker can
//! pre-size its send buffer without ever calling an encoder.

use perfcore_items::{MarketByOrderMeta, Template, TemplatePool};
use quick_xml::Reader;
use quick_xml::events::Event;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("failed to read template file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("malformed XML at byte {0}: {1}")]
    Xml(usize, quick_xml::Error),
    #[error("<field>/<mapEntry> outside of any <domain>/message list at byte {0}")]
    FieldOutsideMessage(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Refresh,
    Update,
    Post,
    Generic,
}

/// Rough per-`type` attribute byte estimate, mirroring the original's
/// fixed-width-field-plus-variable-string size table.
fn field_size_estimate(field_type: Option<&str>, value: Option<&str>) -> usize {
    match field_type {
        Some("REAL") | Some("INT") | Some("UINT") => 8,
        Some("DATE") => 4,
        Some("TIME") => 5,
        Some("DATETIME") => 9,
        Some("ENUM") => 2,
        Some("ASCII_STRING") | Some("RMTES_STRING") => value.map_or(16, str::len),
        _ => 4,
    }
}

pub fn load_template_file(path: &str) -> Result<TemplatePool, LoaderError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Read {
        path: path.to_string(),
        source,
    })?;
    parse_template_file(&text)
}

fn attr(tag: &quick_xml::events::BytesStart, pos: usize, key: &str) -> Result<Option<String>, LoaderError> {
    for a in tag.attributes() {
        let a = a.map_err(|e| LoaderError::Xml(pos, e.into()))?;
        if a.key.as_ref() == key.as_bytes() {
            return Ok(Some(a.unescape_value().map_err(|e| LoaderError::Xml(pos, e))?.into_owned()));
        }
    }
    Ok(None)
}

struct MsgBuilder {
    name: String,
    size: usize,
    mbo: Option<(u64, u64)>,
}

fn parse_template_file(text: &str) -> Result<TemplatePool, LoaderError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut pool = TemplatePool::new();
    let mut domain: Option<String> = None;
    let mut section: Option<Section> = None;
    let mut msg: Option<MsgBuilder> = None;

    loop {
        let pos = reader.buffer_position() as usize;
        match reader.read_event().map_err(|e| LoaderError::Xml(pos, e))? {
            Event::Eof => break,
            Event::Start(tag) | Event::Empty(tag) => {
                match tag.name().as_ref() {
                    b"domain" => {
                        domain = attr(&tag, pos, "name")?;
                    }
                    b"refresh" => {
                        section = Some(Section::Refresh);
                        msg = Some(MsgBuilder {
                            name: attr(&tag, pos, "name")?.unwrap_or_else(|| "refresh".to_string()),
                            size: 0,
                            mbo: None,
                        });
                    }
                    b"updateMsgList" => section = Some(Section::Update),
                    b"postMsgList" => section = Some(Section::Post),
                    b"genMsgList" => section = Some(Section::Generic),
                    b"msg" => {
                        let base = attr(&tag, pos, "baseOrderId")?.and_then(|v| v.parse().ok());
                        let count = attr(&tag, pos, "orderCount")?.and_then(|v| v.parse().ok());
                        msg = Some(MsgBuilder {
                            name: attr(&tag, pos, "name")?.unwrap_or_else(|| "msg".to_string()),
                            size: 0,
                            mbo: base.zip(count),
                        });
                    }
                    b"field" => {
                        let Some(m) = msg.as_mut() else {
                            return Err(LoaderError::FieldOutsideMessage(pos));
                        };
                        let ty = attr(&tag, pos, "type")?;
                        let value = attr(&tag, pos, "value")?;
                        m.size += field_size_estimate(ty.as_deref(), value.as_deref());
                    }
                    b"mapEntry" => {
                        let Some(m) = msg.as_mut() else {
                            return Err(LoaderError::FieldOutsideMessage(pos));
                        };
                        m.size += 8; // orderId + entry-action overhead
                    }
                    _ => {}
                }
            }
            Event::End(tag) => match tag.name().as_ref() {
                b"refresh" => {
                    if let (Some(d), Some(m)) = (domain.as_deref(), msg.take()) {
                        pool.set_refresh(d, finish_template(m));
                    }
                    section = None;
                }
                b"msg" => {
                    if let (Some(d), Some(sec), Some(m)) = (domain.as_deref(), section, msg.take()) {
                        let t = finish_template(m);
                        match sec {
                            Section::Update => pool.add_update(d, t),
                            Section::Post => pool.add_post(d, t),
                            Section::Generic => pool.add_generic(d, t),
                            Section::Refresh => pool.set_refresh(d, t),
                        }
                    }
                }
                b"updateMsgList" | b"postMsgList" | b"genMsgList" => section = None,
                b"domain" => domain = None,
                _ => {}
            },
            _ => {}
        }
    }

    Ok(pool)
}

fn finish_template(m: MsgBuilder) -> Template {
    let t = Template::new(m.name, m.size.max(1));
    match m.mbo {
        Some((base, count)) => t.with_market_by_order(MarketByOrderMeta::new(base, count)),
        None => t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <messageTemplates>
          <domain name="MarketPrice">
            <refresh name="MarketPriceRefresh">
              <field id="22" type="REAL" value="45.25"/>
              <field id="25" type="ASCII_STRING" value="NYSE"/>
            </refresh>
            <updateMsgList>
              <msg name="update-0">
                <field id="22" type="REAL" value="45.30"/>
              </msg>
            </updateMsgList>
            <postMsgList>
              <msg name="post-0">
                <field id="22" type="REAL" value="45.10"/>
              </msg>
            </postMsgList>
          </domain>
          <domain name="MarketByOrder">
            <refresh name="MboRefresh" baseOrderId="1000" orderCount="2">
              <mapEntry orderId="1000">
                <field id="3427" type="ENUM" value="1"/>
              </mapEntry>
              <mapEntry orderId="1001">
                <field id="3427" type="ENUM" value="2"/>
              </mapEntry>
            </refresh>
          </domain>
        </messageTemplates>
    "#;

    #[test]
    fn loads_refresh_and_update_templates_per_domain() {
        let pool = parse_template_file(SAMPLE).unwrap();
        let refresh = pool.refresh("MarketPrice").unwrap();
        assert_eq!(refresh.name, "MarketPriceRefresh");
        assert_eq!(refresh.estimated_encoded_len, 8 + 4); // REAL + "NYSE".len()

        let mut iter = perfcore_items::TemplateIterator::default();
        let update = pool.next_update("MarketPrice", &mut iter).unwrap();
        assert_eq!(update.name, "update-0");

        let post = pool.next_post("MarketPrice", &mut iter).unwrap();
        assert_eq!(post.name, "post-0");
    }

    #[test]
    fn market_by_order_refresh_carries_rotation_metadata() {
        let pool = parse_template_file(SAMPLE).unwrap();
        let refresh = pool.refresh("MarketByOrder").unwrap();
        let mbo = refresh.market_by_order.as_ref().unwrap();
        assert_eq!(mbo.order_id_for(0, 0), 1000);
        assert_eq!(mbo.order_id_for(1, 1), 1003);
    }

    #[test]
    fn field_outside_any_message_is_rejected() {
        let xml = r#"<messageTemplates><domain name="X"><field type="REAL"/></domain></messageTemplates>"#;
        assert!(matches!(
            parse_template_file(xml),
            Err(LoaderError::FieldOutsideMessage(_))
        ));
    }
}
