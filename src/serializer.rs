//! DSML output for a [`BatchRequest`].
//!
//! The batch is first turned into a small element tree so that namespace
//! declarations needed by binary values can be added to the root element
//! once, whenever the first such value is met, and then written out with
//! `quick_xml::Writer`.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::debug;

use crate::batch::{BatchRequest, OnError, Processing, ResponseOrder};
use crate::error::{DsmlError, Result};
use crate::ldap::{
    AttributeValueAssertion, Control, DerefAliases, Filter, Message, MessageParams, ModifyOperation,
    SearchScope,
};
use crate::validate::is_valid_oid;
use crate::value::{self, needs_base64_encoding, Value, XSD_NAMESPACE, XSI_NAMESPACE};
use crate::xml::DSML_NAMESPACE;

#[derive(Debug, Clone)]
pub struct SerializerConfig {
    /// Spaces per nesting level; `None` writes everything on one line.
    pub indent: Option<usize>,
    pub xml_declaration: bool,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            indent: Some(2),
            xml_declaration: true,
        }
    }
}

impl SerializerConfig {
    pub fn compact() -> Self {
        Self {
            indent: None,
            xml_declaration: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    name: &'static str,
    attributes: Vec<(&'static str, String)>,
    text: Option<String>,
    children: Vec<Node>,
}

impl Node {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attributes.push((name, value.into()));
        self
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    fn write<W: Write>(&self, w: &mut Writer<W>, extra: &[(&str, &str)]) -> Result<()> {
        let mut start = BytesStart::new(self.name);
        for &(k, v) in extra {
            start.push_attribute((k, v));
        }
        for (k, v) in &self.attributes {
            start.push_attribute((*k, v.as_str()));
        }
        if self.text.is_none() && self.children.is_empty() {
            w.write_event(Event::Empty(start))?;
            return Ok(());
        }
        w.write_event(Event::Start(start))?;
        if let Some(text) = &self.text {
            w.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write(w, &[])?;
        }
        w.write_event(Event::End(BytesEnd::new(self.name)))?;
        Ok(())
    }
}

/// A serialized batch before it is rendered to text.
#[derive(Debug, Clone)]
pub struct Document {
    root: Node,
    namespaces: Vec<(&'static str, &'static str)>,
}

impl Document {
    /// Namespace declarations (prefix, uri) added to the root besides the
    /// default DSML namespace.
    pub fn namespaces(&self) -> &[(&'static str, &'static str)] {
        &self.namespaces
    }

    pub fn write_to<W: Write>(&self, out: W, config: &SerializerConfig) -> Result<()> {
        let mut w = match config.indent {
            Some(n) => Writer::new_with_indent(out, b' ', n),
            None => Writer::new(out),
        };
        if config.xml_declaration {
            w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        }
        let declarations: Vec<(String, &str)> = std::iter::once(("xmlns".to_owned(), DSML_NAMESPACE))
            .chain(self.namespaces.iter().map(|(p, uri)| (format!("xmlns:{}", p), *uri)))
            .collect();
        let extra: Vec<(&str, &str)> = declarations.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        self.root.write(&mut w, &extra)
    }

    pub fn to_string_with(&self, config: &SerializerConfig) -> Result<String> {
        let mut out = Vec::new();
        self.write_to(&mut out, config)?;
        String::from_utf8(out).map_err(|e| DsmlError::Utf8(e.utf8_error()))
    }
}

#[derive(Default)]
struct Serializer {
    namespaces: Vec<(&'static str, &'static str)>,
}

fn scope_name(scope: SearchScope) -> &'static str {
    match scope {
        SearchScope::BaseObject => "baseObject",
        SearchScope::SingleLevel => "singleLevel",
        SearchScope::WholeSubtree => "wholeSubtree",
    }
}

fn deref_name(deref: DerefAliases) -> &'static str {
    match deref {
        DerefAliases::NeverDerefAliases => "neverDerefAliases",
        DerefAliases::DerefInSearching => "derefInSearching",
        DerefAliases::DerefFindingBaseObj => "derefFindingBaseObj",
        DerefAliases::DerefAlways => "derefAlways",
    }
}

fn operation_name(op: ModifyOperation) -> &'static str {
    match op {
        ModifyOperation::Add => "add",
        ModifyOperation::Delete => "delete",
        ModifyOperation::Replace => "replace",
    }
}

impl Serializer {
    /// Returns false when the prefix was already declared.
    fn register_namespace(&mut self, prefix: &'static str, uri: &'static str) -> bool {
        if self.namespaces.iter().any(|(p, _)| *p == prefix) {
            return false;
        }
        debug!(prefix, uri, "namespace declared on batchRequest");
        self.namespaces.push((prefix, uri));
        true
    }

    fn value(&mut self, name: &'static str, value: &Value) -> Node {
        match value {
            Value::Text(s) if !needs_base64_encoding(value) => Node::new(name).text(s.as_str()),
            _ => {
                self.register_namespace("xsd", XSD_NAMESPACE);
                self.register_namespace("xsi", XSI_NAMESPACE);
                Node::new(name)
                    .attr("xsi:type", "xsd:base64Binary")
                    .text(value::encode(value.as_bytes()))
            }
        }
    }

    fn control(&mut self, control: &Control) -> Result<Node> {
        if !is_valid_oid(&control.control_type) {
            return Err(DsmlError::Incomplete("control type is not an object identifier"));
        }
        let mut node = Node::new("control").attr("type", control.control_type.as_str());
        if control.criticality {
            node = node.attr("criticality", "true");
        }
        if let Some(v) = &control.value {
            node = node.child(self.value("controlValue", v));
        }
        Ok(node)
    }

    fn assertion(&mut self, name: &'static str, a: &AttributeValueAssertion) -> Node {
        let value = self.value("value", &a.value);
        Node::new(name).attr("name", a.name.as_str()).child(value)
    }

    fn filter(&mut self, filter: &Filter) -> Node {
        match filter {
            Filter::And(children) => {
                let mut node = Node::new("and");
                for c in children {
                    node = node.child(self.filter(c));
                }
                node
            }
            Filter::Or(children) => {
                let mut node = Node::new("or");
                for c in children {
                    node = node.child(self.filter(c));
                }
                node
            }
            Filter::Not(inner) => {
                let child = self.filter(inner);
                Node::new("not").child(child)
            }
            Filter::Substrings(s) => {
                let mut node = Node::new("substrings").attr("name", s.name.as_str());
                if let Some(v) = &s.initial {
                    node = node.child(self.value("initial", v));
                }
                for v in &s.any {
                    node = node.child(self.value("any", v));
                }
                if let Some(v) = &s.final_ {
                    node = node.child(self.value("final", v));
                }
                node
            }
            Filter::EqualityMatch(a) => self.assertion("equalityMatch", a),
            Filter::GreaterOrEqual(a) => self.assertion("greaterOrEqual", a),
            Filter::LessOrEqual(a) => self.assertion("lessOrEqual", a),
            Filter::ApproxMatch(a) => self.assertion("approxMatch", a),
            Filter::Present(name) => Node::new("present").attr("name", name.as_str()),
            Filter::ExtensibleMatch(m) => {
                let mut node = Node::new("extensibleMatch");
                if m.dn_attributes {
                    node = node.attr("dnAttributes", "true");
                }
                if let Some(rule) = &m.matching_rule {
                    node = node.attr("matchingRule", rule.as_str());
                }
                if let Some(name) = &m.name {
                    node = node.attr("name", name.as_str());
                }
                node.child(self.value("value", &m.value))
            }
        }
    }

    fn request(&mut self, message: &Message) -> Result<Node> {
        let mut node = Node::new(message.params.tag());
        if let Some(id) = message.id {
            node = node.attr("requestID", id.to_string());
        }
        let mut body = Vec::new();
        match &message.params {
            MessageParams::Abandon(m) => {
                node = node.attr("abandonID", m.abandon_id.to_string());
            }
            MessageParams::Add(m) => {
                node = node.attr("dn", m.dn.as_str());
                for a in &m.attributes {
                    let mut attr = Node::new("attr").attr("name", a.name.as_str());
                    for v in &a.values {
                        attr = attr.child(self.value("value", v));
                    }
                    body.push(attr);
                }
            }
            MessageParams::Bind(m) => {
                node = node.attr("principal", m.name.as_str());
            }
            MessageParams::Compare(m) => {
                node = node.attr("dn", m.dn.as_str());
                let value = self.value("value", &m.value);
                body.push(Node::new("assertion").attr("name", m.attribute.as_str()).child(value));
            }
            MessageParams::Delete(m) => {
                node = node.attr("dn", m.dn.as_str());
            }
            MessageParams::Extended(m) => {
                if !is_valid_oid(&m.name) {
                    return Err(DsmlError::Incomplete("extendedRequest without a requestName OID"));
                }
                body.push(Node::new("requestName").text(m.name.as_str()));
                if let Some(v) = &m.value {
                    body.push(self.value("requestValue", v));
                }
            }
            MessageParams::Modify(m) => {
                node = node.attr("dn", m.dn.as_str());
                for change in &m.changes {
                    let mut n = Node::new("modification")
                        .attr("name", change.attribute.name.as_str())
                        .attr("operation", operation_name(change.operation));
                    for v in &change.attribute.values {
                        n = n.child(self.value("value", v));
                    }
                    body.push(n);
                }
            }
            MessageParams::ModifyDn(m) => {
                node = node
                    .attr("dn", m.dn.as_str())
                    .attr("newrdn", m.new_rdn.as_str())
                    .attr("deleteoldrdn", if m.delete_old_rdn { "true" } else { "false" });
                if let Some(sup) = &m.new_superior {
                    node = node.attr("newSuperior", sup.as_str());
                }
            }
            MessageParams::Search(m) => {
                node = node
                    .attr("dn", m.base_object.as_str())
                    .attr("scope", scope_name(m.scope))
                    .attr("derefAliases", deref_name(m.deref));
                if m.size_limit != 0 {
                    node = node.attr("sizeLimit", m.size_limit.to_string());
                }
                if m.time_limit != 0 {
                    node = node.attr("timeLimit", m.time_limit.to_string());
                }
                if m.types_only {
                    node = node.attr("typesOnly", "true");
                }
                let filter = m
                    .filter
                    .as_ref()
                    .ok_or(DsmlError::Incomplete("searchRequest without a filter"))?;
                body.push(Node::new("filter").child(self.filter(filter)));
                if !m.attributes.is_empty() {
                    let mut attrs = Node::new("attributes");
                    for name in &m.attributes {
                        attrs = attrs.child(Node::new("attribute").attr("name", name.as_str()));
                    }
                    body.push(attrs);
                }
            }
        }
        for c in &message.controls {
            node = node.child(self.control(c)?);
        }
        node.children.extend(body);
        Ok(node)
    }

    fn batch(mut self, batch: &BatchRequest) -> Result<Document> {
        let mut root = Node::new("batchRequest");
        if let Some(id) = batch.request_id {
            root = root.attr("requestID", id.to_string());
        }
        if batch.processing != Processing::default() {
            root = root.attr("processing", batch.processing.as_str());
        }
        if batch.on_error != OnError::default() {
            root = root.attr("onError", batch.on_error.as_str());
        }
        if batch.response_order != ResponseOrder::default() {
            root = root.attr("responseOrder", batch.response_order.as_str());
        }
        for message in &batch.requests {
            root = root.child(self.request(message)?);
        }
        Ok(Document {
            root,
            namespaces: self.namespaces,
        })
    }
}

pub fn to_document(batch: &BatchRequest) -> Result<Document> {
    Serializer::default().batch(batch)
}

pub fn to_string(batch: &BatchRequest) -> Result<String> {
    to_string_with(batch, &SerializerConfig::default())
}

pub fn to_string_with(batch: &BatchRequest, config: &SerializerConfig) -> Result<String> {
    to_document(batch)?.to_string_with(config)
}

#[cfg(test)]
use crate::ldap::{Attribute, MsgAdd, MsgExtended, MsgSearch};
#[cfg(test)]
use crate::parser::parse_batch_request;

#[cfg(test)]
const ROUND_TRIP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<batchRequest xmlns="urn:oasis:names:tc:DSML:2:0:core" requestID="7"
    processing="parallel" onError="resume" responseOrder="unordered">
  <authRequest requestID="1" principal="cn=admin,o=acme"/>
  <addRequest requestID="2" dn="cn=alice,o=acme">
    <control type="1.2.840.113556.1.4.1413" criticality="true"><controlValue>x</controlValue></control>
    <attr name="objectClass"><value>person</value><value>top</value></attr>
    <attr name="photo">
      <value xmlns:xsd="http://www.w3.org/2001/XMLSchema"
             xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
             xsi:type="xsd:base64Binary">AAEC</value>
    </attr>
  </addRequest>
  <compareRequest requestID="3" dn="cn=alice,o=acme">
    <assertion name="sn"><value>Smith</value></assertion>
  </compareRequest>
  <delRequest requestID="4" dn="cn=bob,o=acme"/>
  <modDNRequest requestID="5" dn="cn=alice,o=acme" newrdn="cn=alicia"
      deleteoldrdn="false" newSuperior="ou=people,o=acme"/>
  <modifyRequest requestID="6" dn="cn=alice,o=acme">
    <modification name="mail" operation="replace"><value>a@acme.org</value></modification>
    <modification name="fax" operation="delete"/>
  </modifyRequest>
  <extendedRequest requestID="8">
    <requestName>1.3.6.1.4.1.1466.20037</requestName>
    <requestValue>tls</requestValue>
  </extendedRequest>
  <searchRequest requestID="9" dn="o=acme" scope="singleLevel" derefAliases="derefAlways"
      sizeLimit="10" typesOnly="true">
    <filter>
      <and>
        <or>
          <substrings name="cn"><initial>al</initial><any>i</any><final>e</final></substrings>
          <extensibleMatch name="cn" matchingRule="2.5.13.2" dnAttributes="true"><value>x</value></extensibleMatch>
        </or>
        <not><present name="fax"/></not>
        <greaterOrEqual name="age"><value>18</value></greaterOrEqual>
      </and>
    </filter>
    <attributes><attribute name="cn"/><attribute name="mail"/></attributes>
  </searchRequest>
  <abandonRequest requestID="10" abandonID="9"/>
</batchRequest>"#;

#[test]
fn round_trip_test() {
    let batch = parse_batch_request(ROUND_TRIP).unwrap();
    assert_eq!(batch.requests.len(), 9);
    for config in [SerializerConfig::default(), SerializerConfig::compact()] {
        let xml = to_string_with(&batch, &config).unwrap();
        assert_eq!(parse_batch_request(&xml).unwrap(), batch);
    }
    let xml = to_string(&batch).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
}

#[test]
fn namespaces_declared_once_test() {
    let values = vec![
        Value::Binary(vec![1, 2]),
        Value::from("nul\u{0}"),
        Value::Binary(vec![3]),
        Value::from(" leading"),
    ];
    let mut batch = BatchRequest::new();
    batch.add_request(Message::new(
        Some(1),
        MessageParams::Add(MsgAdd {
            dn: "o=acme".to_owned(),
            attributes: vec![Attribute { name: "x".to_owned(), values }],
        }),
    ));
    let doc = to_document(&batch).unwrap();
    assert_eq!(doc.namespaces().len(), 2);
    let xml = doc.to_string_with(&SerializerConfig::compact()).unwrap();
    assert_eq!(xml.matches("xmlns:xsi=").count(), 1);
    assert_eq!(xml.matches("xmlns:xsd=").count(), 1);
    assert_eq!(xml.matches(r#"xsi:type="xsd:base64Binary""#).count(), 4);
    assert!(xml.contains(">bnVsAA==<"));

    let reparsed = parse_batch_request(&xml).unwrap();
    match &reparsed.requests[0].params {
        MessageParams::Add(m) => {
            assert_eq!(m.attributes[0].values[1], Value::Binary(b"nul\0".to_vec()));
            assert_eq!(m.attributes[0].values[3].as_bytes(), b" leading");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn literal_text_test() {
    let batch = parse_batch_request(
        r#"<batchRequest><compareRequest dn="o=acme"><assertion name="sn"><value>Smith &amp; Co</value></assertion></compareRequest></batchRequest>"#,
    )
    .unwrap();
    let doc = to_document(&batch).unwrap();
    assert!(doc.namespaces().is_empty());
    assert_eq!(
        doc.to_string_with(&SerializerConfig::compact()).unwrap(),
        r#"<batchRequest xmlns="urn:oasis:names:tc:DSML:2:0:core"><compareRequest dn="o=acme"><assertion name="sn"><value>Smith &amp; Co</value></assertion></compareRequest></batchRequest>"#
    );
}

#[test]
fn defaults_omitted_test() {
    let config = SerializerConfig::compact();
    assert_eq!(
        to_string_with(&BatchRequest::new(), &config).unwrap(),
        r#"<batchRequest xmlns="urn:oasis:names:tc:DSML:2:0:core"/>"#
    );
    let batch = parse_batch_request(
        r#"<batchRequest processing="sequential" onError="exit">
             <searchRequest dn="" scope="baseObject" derefAliases="neverDerefAliases" sizeLimit="0">
               <filter><present name="objectClass"/></filter>
             </searchRequest>
           </batchRequest>"#,
    )
    .unwrap();
    assert_eq!(
        to_string_with(&batch, &config).unwrap(),
        r#"<batchRequest xmlns="urn:oasis:names:tc:DSML:2:0:core"><searchRequest dn="" scope="baseObject" derefAliases="neverDerefAliases"><filter><present name="objectClass"/></filter></searchRequest></batchRequest>"#
    );
}

#[test]
fn incomplete_request_test() {
    let mut batch = BatchRequest::new();
    batch.add_request(Message::new(
        None,
        MessageParams::Search(MsgSearch {
            base_object: "o=acme".to_owned(),
            scope: SearchScope::BaseObject,
            deref: DerefAliases::NeverDerefAliases,
            size_limit: 0,
            time_limit: 0,
            types_only: false,
            filter: None,
            attributes: Vec::new(),
        }),
    ));
    assert!(matches!(to_string(&batch), Err(DsmlError::Incomplete(_))));

    let mut batch = BatchRequest::new();
    batch.add_request(Message::new(None, MessageParams::Extended(MsgExtended { name: String::new(), value: None })));
    assert!(matches!(to_string(&batch), Err(DsmlError::Incomplete(_))));

    let mut batch = parse_batch_request(r#"<batchRequest><delRequest dn="o=acme"/></batchRequest>"#).unwrap();
    batch.requests[0].controls.push(Control { control_type: "paged".to_owned(), criticality: false, value: None });
    assert!(matches!(to_string(&batch), Err(DsmlError::Incomplete(_))));
}

#[test]
fn character_reference_round_trip_test() {
    let batch = parse_batch_request(
        r#"<batchRequest><compareRequest dn="o=acme"><assertion name="description"><value>a&#13;b</value></assertion></compareRequest></batchRequest>"#,
    )
    .unwrap();
    match &batch.requests[0].params {
        MessageParams::Compare(c) => assert_eq!(c.value.as_bytes(), b"a\rb"),
        other => panic!("unexpected {:?}", other),
    }
    let xml = to_string(&batch).unwrap();
    assert!(xml.contains(r#"xsi:type="xsd:base64Binary">YQ1i<"#));
    assert_eq!(parse_batch_request(&xml).unwrap(), batch);
}
