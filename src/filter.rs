//! Incremental construction of a search filter tree.
//!
//! Connectors that are still open live on an owned stack; a connector is moved
//! into its parent (or becomes the root) when it closes. Leaves are attached
//! immediately and stay reachable as the last child of the top frame so that a
//! following `<value>` can be routed to them.

use crate::error::BuilderError;
use crate::ldap::{ConnectorKind, Filter};

#[derive(Debug)]
struct Frame {
    kind: ConnectorKind,
    children: Vec<Filter>,
}

#[derive(Debug, Default)]
pub struct FilterBuilder {
    stack: Vec<Frame>,
    root: Option<Filter>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_room(&self) -> Result<(), BuilderError> {
        match self.stack.last() {
            Some(frame) if frame.kind == ConnectorKind::Not && !frame.children.is_empty() => {
                Err(BuilderError::FilterStructure("<not> takes exactly one filter"))
            }
            Some(_) => Ok(()),
            None if self.root.is_some() => {
                Err(BuilderError::FilterStructure("no open connector to hold another filter"))
            }
            None => Ok(()),
        }
    }

    fn attach(&mut self, filter: Filter) {
        match self.stack.last_mut() {
            Some(frame) => frame.children.push(filter),
            None => self.root = Some(filter),
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn open_connector(&mut self, kind: ConnectorKind) -> Result<(), BuilderError> {
        self.check_room()?;
        self.stack.push(Frame {
            kind,
            children: Vec::new(),
        });
        Ok(())
    }

    pub fn close_connector(&mut self) -> Result<(), BuilderError> {
        let mut frame = self
            .stack
            .pop()
            .ok_or(BuilderError::FilterStructure("no connector to close"))?;
        let filter = match frame.kind {
            ConnectorKind::And => Filter::And(frame.children),
            ConnectorKind::Or => Filter::Or(frame.children),
            ConnectorKind::Not => match (frame.children.pop(), frame.children.is_empty()) {
                (Some(inner), true) => Filter::Not(Box::new(inner)),
                _ => return Err(BuilderError::FilterStructure("<not> takes exactly one filter")),
            },
        };
        self.attach(filter);
        Ok(())
    }

    /// Attaches a leaf; it becomes the target of subsequent value elements.
    pub fn add_terminal(&mut self, leaf: Filter) -> Result<(), BuilderError> {
        debug_assert!(leaf.is_terminal());
        self.check_room()?;
        self.attach(leaf);
        Ok(())
    }

    pub fn terminal_mut(&mut self) -> Result<&mut Filter, BuilderError> {
        let target = match self.stack.last_mut() {
            Some(frame) => frame.children.last_mut(),
            None => self.root.as_mut(),
        };
        target
            .filter(|f| f.is_terminal())
            .ok_or(BuilderError::FilterStructure("no filter to receive the value"))
    }

    pub fn finish(self) -> Result<Filter, BuilderError> {
        if !self.stack.is_empty() {
            return Err(BuilderError::FilterStructure("unclosed connector"));
        }
        self.root.ok_or(BuilderError::FilterStructure("empty filter"))
    }
}

#[cfg(test)]
fn eq(name: &str, value: &str) -> Filter {
    Filter::EqualityMatch(crate::ldap::AttributeValueAssertion {
        name: name.to_owned(),
        value: value.into(),
    })
}

#[test]
fn nested_connectors_test() {
    let mut b = FilterBuilder::new();
    b.open_connector(ConnectorKind::And).unwrap();
    b.open_connector(ConnectorKind::Or).unwrap();
    b.add_terminal(eq("cn", "x")).unwrap();
    b.add_terminal(eq("sn", "y")).unwrap();
    b.close_connector().unwrap();
    b.open_connector(ConnectorKind::Not).unwrap();
    b.add_terminal(Filter::Present("mail".to_owned())).unwrap();
    b.close_connector().unwrap();
    assert_eq!(b.depth(), 1);
    b.close_connector().unwrap();
    assert_eq!(
        b.finish().unwrap(),
        Filter::And(vec![
            Filter::Or(vec![eq("cn", "x"), eq("sn", "y")]),
            Filter::Not(Box::new(Filter::Present("mail".to_owned()))),
        ])
    );
}

#[test]
fn single_leaf_root_test() {
    let mut b = FilterBuilder::new();
    b.add_terminal(Filter::Present("objectClass".to_owned())).unwrap();
    assert!(b.terminal_mut().is_ok());
    assert!(matches!(
        b.add_terminal(Filter::Present("cn".to_owned())),
        Err(BuilderError::FilterStructure(_))
    ));
    assert_eq!(b.finish().unwrap(), Filter::Present("objectClass".to_owned()));
}

#[test]
fn not_takes_one_child_test() {
    let mut b = FilterBuilder::new();
    b.open_connector(ConnectorKind::Not).unwrap();
    b.add_terminal(eq("cn", "x")).unwrap();
    assert!(b.add_terminal(eq("cn", "y")).is_err());

    let mut b = FilterBuilder::new();
    b.open_connector(ConnectorKind::Not).unwrap();
    assert!(b.close_connector().is_err());
}

#[test]
fn empty_and_unclosed_test() {
    let mut b = FilterBuilder::new();
    b.open_connector(ConnectorKind::And).unwrap();
    assert!(b.terminal_mut().is_err());
    b.close_connector().unwrap();
    assert_eq!(b.finish().unwrap(), Filter::And(vec![]));

    let mut b = FilterBuilder::new();
    b.open_connector(ConnectorKind::Or).unwrap();
    assert!(b.finish().is_err());
    assert!(FilterBuilder::new().finish().is_err());
}
