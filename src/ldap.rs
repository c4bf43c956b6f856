use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValueAssertion {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubstringFilter {
    pub name: String,
    pub initial: Option<Value>,
    pub any: Vec<Value>,
    pub final_: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensibleMatch {
    pub matching_rule: Option<String>,
    pub name: Option<String>,
    pub value: Value,
    pub dn_attributes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Substrings(SubstringFilter),
    EqualityMatch(AttributeValueAssertion),
    GreaterOrEqual(AttributeValueAssertion),
    LessOrEqual(AttributeValueAssertion),
    ApproxMatch(AttributeValueAssertion),
    Present(String),
    ExtensibleMatch(ExtensibleMatch),
}

impl Filter {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Filter::And(_) | Filter::Or(_) | Filter::Not(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub control_type: String,
    pub criticality: bool,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    BaseObject = 0,
    SingleLevel = 1,
    WholeSubtree = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerefAliases {
    NeverDerefAliases = 0,
    DerefInSearching = 1,
    DerefFindingBaseObj = 2,
    DerefAlways = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOperation {
    Add = 0,
    Delete = 1,
    Replace = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgAbandon {
    pub abandon_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgAdd {
    pub dn: String,
    pub attributes: Vec<Attribute>,
}

/// DSML `authRequest`: a simple bind carrying only the principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgBind {
    pub version: u32,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgCompare {
    pub dn: String,
    pub attribute: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgDelete {
    pub dn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgExtended {
    pub name: String,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub operation: ModifyOperation,
    pub attribute: Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgModify {
    pub dn: String,
    pub changes: Vec<Modification>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgModifyDn {
    pub dn: String,
    pub new_rdn: String,
    pub delete_old_rdn: bool,
    pub new_superior: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgSearch {
    pub base_object: String,
    pub scope: SearchScope,
    pub deref: DerefAliases,
    pub size_limit: u32,
    pub time_limit: u32,
    pub types_only: bool,
    pub filter: Option<Filter>,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageParams {
    Abandon(MsgAbandon),
    Add(MsgAdd),
    Bind(MsgBind),
    Compare(MsgCompare),
    Delete(MsgDelete),
    Extended(MsgExtended),
    Modify(MsgModify),
    ModifyDn(MsgModifyDn),
    Search(MsgSearch),
}

impl MessageParams {
    /// DSML element name of the request.
    pub fn tag(&self) -> &'static str {
        match self {
            MessageParams::Abandon(_) => "abandonRequest",
            MessageParams::Add(_) => "addRequest",
            MessageParams::Bind(_) => "authRequest",
            MessageParams::Compare(_) => "compareRequest",
            MessageParams::Delete(_) => "delRequest",
            MessageParams::Extended(_) => "extendedRequest",
            MessageParams::Modify(_) => "modifyRequest",
            MessageParams::ModifyDn(_) => "modDNRequest",
            MessageParams::Search(_) => "searchRequest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Option<u32>,
    pub controls: Vec<Control>,
    pub params: MessageParams,
}

impl Message {
    pub fn new(id: Option<u32>, params: MessageParams) -> Self {
        Self {
            id,
            controls: Vec::new(),
            params,
        }
    }
}
