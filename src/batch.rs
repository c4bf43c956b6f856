use std::collections::HashSet;

use crate::ldap::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Processing {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    Resume,
    #[default]
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOrder {
    #[default]
    Sequential,
    Unordered,
}

impl Processing {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sequential" => Some(Processing::Sequential),
            "parallel" => Some(Processing::Parallel),
            _ => None,
        }
    }
    pub fn as_str(self) -> &'static str {
        match self {
            Processing::Sequential => "sequential",
            Processing::Parallel => "parallel",
        }
    }
}

impl OnError {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resume" => Some(OnError::Resume),
            "exit" => Some(OnError::Exit),
            _ => None,
        }
    }
    pub fn as_str(self) -> &'static str {
        match self {
            OnError::Resume => "resume",
            OnError::Exit => "exit",
        }
    }
}

impl ResponseOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sequential" => Some(ResponseOrder::Sequential),
            "unordered" => Some(ResponseOrder::Unordered),
            _ => None,
        }
    }
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseOrder::Sequential => "sequential",
            ResponseOrder::Unordered => "unordered",
        }
    }
}

/// A DSML `batchRequest`: requests in document order plus batch policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchRequest {
    pub request_id: Option<u32>,
    pub processing: Processing,
    pub on_error: OnError,
    pub response_order: ResponseOrder,
    pub requests: Vec<Message>,
}

impl BatchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_request(&mut self, request: Message) {
        self.requests.push(request);
    }

    pub fn current_request(&self) -> Option<&Message> {
        self.requests.last()
    }

    pub fn current_request_mut(&mut self) -> Option<&mut Message> {
        self.requests.last_mut()
    }

    /// Message id of every request, in order. Requests without a
    /// `requestID` get the lowest positive ids not taken by any explicit one.
    pub fn message_ids(&self) -> Vec<u32> {
        let taken: HashSet<u32> = self.requests.iter().filter_map(|r| r.id).collect();
        let mut next = 1;
        self.requests
            .iter()
            .map(|r| match r.id {
                Some(id) => id,
                None => {
                    while taken.contains(&next) {
                        next += 1;
                    }
                    let id = next;
                    next += 1;
                    id
                }
            })
            .collect()
    }
}

#[test]
fn defaults_test() {
    let b = BatchRequest::new();
    assert_eq!(b.processing, Processing::Sequential);
    assert_eq!(b.on_error, OnError::Exit);
    assert_eq!(b.response_order, ResponseOrder::Sequential);
    assert!(b.current_request().is_none());
}

#[test]
fn enum_text_test() {
    for p in [Processing::Sequential, Processing::Parallel] {
        assert_eq!(Processing::parse(p.as_str()), Some(p));
    }
    assert_eq!(OnError::parse("resume"), Some(OnError::Resume));
    assert_eq!(ResponseOrder::parse("unordered"), Some(ResponseOrder::Unordered));
    assert_eq!(Processing::parse("Parallel"), None);
}

#[test]
fn message_ids_test() {
    use crate::ldap::{MessageParams, MsgDelete};
    let del = |id: Option<u32>| Message::new(id, MessageParams::Delete(MsgDelete { dn: "o=acme".to_owned() }));
    let mut b = BatchRequest::new();
    b.add_request(del(None));
    b.add_request(del(Some(1)));
    b.add_request(del(None));
    b.add_request(del(Some(3)));
    b.add_request(del(None));
    assert_eq!(b.message_ids(), vec![2, 1, 4, 3, 5]);
    assert!(BatchRequest::new().message_ids().is_empty());
}
