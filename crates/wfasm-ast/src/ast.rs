//! Node kinds consumed by the front end (spec §4.3). Everything the compiler
//! walks — expressions, statements, declarations, and patterns alike — is a
//! [`Node`], so [`crate::path::Path`] and [`crate::visitor::Visitor`] can
//! treat the whole tree uniformly.

use std::rc::Rc;

use wfasm_value::Value;

pub type NodeRef = Rc<Node>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

/// A literal's tagged value, as it appears at a `Literal` node (spec §4.3:
/// "Null/Bool/Int/Float/String/Template").
#[derive(Debug, Clone)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A template literal: an interleaving of literal spans and embedded
    /// expressions, evaluated by concatenation at codegen time.
    Template(Vec<TemplatePart>),
}

impl Literal {
    /// The tagged [`Value`] this literal lowers to directly, for every kind
    /// except `Template` (which has no single constant value — it lowers to
    /// a chain of STRING ADDs instead).
    pub fn as_value(&self) -> Option<Value> {
        match self {
            Literal::Null => Some(Value::Null),
            Literal::Bool(b) => Some(Value::Bool(*b)),
            Literal::Int(n) => Some(Value::Int64(*n)),
            Literal::Float(n) => Some(Value::Double(*n)),
            Literal::String(s) => Some(Value::string(s.clone())),
            Literal::Template(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TemplatePart {
    Str(String),
    Expr(NodeRef),
}

/// An object- or pattern-property key.
#[derive(Debug, Clone)]
pub enum PropertyKey {
    Identifier(String),
    String(String),
    Computed(NodeRef),
}

/// One AST node. Patterns (`ArrayPattern`/`ObjectPattern`/`RestPattern`/
/// `AssignmentPattern`/`EmptyPattern`) are node kinds in their own right, not
/// a separate type, matching spec §4.3's node-kind list.
#[derive(Debug, Clone)]
pub enum Node {
    Program(Vec<NodeRef>),

    FunctionDeclaration {
        name: String,
        annotation: Option<NodeRef>,
        params: Vec<NodeRef>,
        rest: Option<NodeRef>,
        body: NodeRef,
    },

    VariableDeclaration(Vec<NodeRef>),
    Declarator {
        pattern: NodeRef,
        init: Option<NodeRef>,
    },

    Identifier(String),
    Literal(Literal),

    BinaryExpression {
        op: BinOp,
        left: NodeRef,
        right: NodeRef,
    },
    UnaryExpression {
        op: UnOp,
        argument: NodeRef,
    },
    CallExpression {
        callee: NodeRef,
        arguments: Vec<NodeRef>,
    },
    MemberExpression {
        object: NodeRef,
        property: NodeRef,
        computed: bool,
    },
    ArrayExpression(Vec<NodeRef>),
    ObjectExpression(Vec<NodeRef>),
    Property {
        key: PropertyKey,
        value: NodeRef,
    },
    /// `target` is expected to be an `Identifier` or `MemberExpression`
    /// referring to an existing binding; destructuring assignment targets
    /// are not modeled here (only declarators and parameters destructure).
    AssignmentExpression {
        target: NodeRef,
        value: NodeRef,
    },

    Block(Vec<NodeRef>),
    If {
        test: NodeRef,
        consequent: NodeRef,
        alternate: Option<NodeRef>,
    },
    While {
        test: NodeRef,
        body: NodeRef,
    },
    For {
        init: Option<NodeRef>,
        test: Option<NodeRef>,
        update: Option<NodeRef>,
        body: NodeRef,
    },
    ForIn {
        left: NodeRef,
        right: NodeRef,
        body: NodeRef,
    },
    Return(Option<NodeRef>),
    Throw(NodeRef),
    Break,
    Continue,

    ImportDeclaration {
        package: String,
        specifiers: Vec<NodeRef>,
    },
    ImportSpecifier {
        imported: String,
        local: String,
        semver: String,
    },
    Annotation {
        name: String,
        literal: String,
    },

    ArrayPattern(Vec<NodeRef>),
    ObjectPattern(Vec<(String, NodeRef)>),
    RestPattern(NodeRef),
    AssignmentPattern {
        target: NodeRef,
        default: NodeRef,
    },
    EmptyPattern,
}

/// One entry in a [`crate::path::Path`]'s route: the field name a child was
/// reached through, plus its index if the field is a list (spec §4.3: "entry
/// pairs of (key, index?)").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub key: &'static str,
    pub index: Option<usize>,
}

impl Node {
    /// Every direct child, tagged with the route entry that reaches it.
    /// `Path` uses this to build and cache its child paths.
    pub fn children(&self) -> Vec<(RouteEntry, NodeRef)> {
        let one = |key: &'static str, n: &NodeRef| vec![(RouteEntry { key, index: None }, n.clone())];
        let opt = |key: &'static str, n: &Option<NodeRef>| {
            n.iter().map(|n| (RouteEntry { key, index: None }, n.clone())).collect::<Vec<_>>()
        };
        let list = |key: &'static str, ns: &[NodeRef]| {
            ns.iter()
                .enumerate()
                .map(|(i, n)| (RouteEntry { key, index: Some(i) }, n.clone()))
                .collect::<Vec<_>>()
        };

        match self {
            Node::Program(body) => list("body", body),
            Node::FunctionDeclaration { annotation, params, rest, body, .. } => {
                let mut v = opt("annotation", annotation);
                v.extend(list("params", params));
                v.extend(opt("rest", rest));
                v.extend(one("body", body));
                v
            }
            Node::VariableDeclaration(decls) => list("declarations", decls),
            Node::Declarator { pattern, init } => {
                let mut v = one("pattern", pattern);
                v.extend(opt("init", init));
                v
            }
            Node::Identifier(_) => vec![],
            Node::Literal(Literal::Template(parts)) => parts
                .iter()
                .enumerate()
                .filter_map(|(i, p)| match p {
                    TemplatePart::Str(_) => None,
                    TemplatePart::Expr(n) => Some((RouteEntry { key: "parts", index: Some(i) }, n.clone())),
                })
                .collect(),
            Node::Literal(_) => vec![],
            Node::BinaryExpression { left, right, .. } => {
                let mut v = one("left", left);
                v.extend(one("right", right));
                v
            }
            Node::UnaryExpression { argument, .. } => one("argument", argument),
            Node::CallExpression { callee, arguments } => {
                let mut v = one("callee", callee);
                v.extend(list("arguments", arguments));
                v
            }
            Node::MemberExpression { object, property, .. } => {
                let mut v = one("object", object);
                v.extend(one("property", property));
                v
            }
            Node::ArrayExpression(elements) => list("elements", elements),
            Node::ObjectExpression(props) => list("properties", props),
            Node::Property { key, value } => {
                let mut v = match key {
                    PropertyKey::Computed(n) => one("key", n),
                    _ => vec![],
                };
                v.extend(one("value", value));
                v
            }
            Node::AssignmentExpression { target, value } => {
                let mut v = one("target", target);
                v.extend(one("value", value));
                v
            }
            Node::Block(body) => list("body", body),
            Node::If { test, consequent, alternate } => {
                let mut v = one("test", test);
                v.extend(one("consequent", consequent));
                v.extend(opt("alternate", alternate));
                v
            }
            Node::While { test, body } => {
                let mut v = one("test", test);
                v.extend(one("body", body));
                v
            }
            Node::For { init, test, update, body } => {
                let mut v = opt("init", init);
                v.extend(opt("test", test));
                v.extend(opt("update", update));
                v.extend(one("body", body));
                v
            }
            Node::ForIn { left, right, body } => {
                let mut v = one("left", left);
                v.extend(one("right", right));
                v.extend(one("body", body));
                v
            }
            Node::Return(argument) => opt("argument", argument),
            Node::Throw(argument) => one("argument", argument),
            Node::Break | Node::Continue => vec![],
            Node::ImportDeclaration { specifiers, .. } => list("specifiers", specifiers),
            Node::ImportSpecifier { .. } => vec![],
            Node::Annotation { .. } => vec![],
            Node::ArrayPattern(elements) => list("elements", elements),
            Node::ObjectPattern(props) => props
                .iter()
                .enumerate()
                .map(|(i, (_, n))| (RouteEntry { key: "properties", index: Some(i) }, n.clone()))
                .collect(),
            Node::RestPattern(argument) => one("argument", argument),
            Node::AssignmentPattern { target, default } => {
                let mut v = one("target", target);
                v.extend(one("default", default));
                v
            }
            Node::EmptyPattern => vec![],
        }
    }

    /// Human-readable node kind, used in diagnostics and trace logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Program(_) => "Program",
            Node::FunctionDeclaration { .. } => "FunctionDeclaration",
            Node::VariableDeclaration(_) => "VariableDeclaration",
            Node::Declarator { .. } => "Declarator",
            Node::Identifier(_) => "Identifier",
            Node::Literal(_) => "Literal",
            Node::BinaryExpression { .. } => "BinaryExpression",
            Node::UnaryExpression { .. } => "UnaryExpression",
            Node::CallExpression { .. } => "CallExpression",
            Node::MemberExpression { .. } => "MemberExpression",
            Node::ArrayExpression(_) => "ArrayExpression",
            Node::ObjectExpression(_) => "ObjectExpression",
            Node::Property { .. } => "Property",
            Node::AssignmentExpression { .. } => "AssignmentExpression",
            Node::Block(_) => "Block",
            Node::If { .. } => "If",
            Node::While { .. } => "While",
            Node::For { .. } => "For",
            Node::ForIn { .. } => "ForIn",
            Node::Return(_) => "Return",
            Node::Throw(_) => "Throw",
            Node::Break => "Break",
            Node::Continue => "Continue",
            Node::ImportDeclaration { .. } => "ImportDeclaration",
            Node::ImportSpecifier { .. } => "ImportSpecifier",
            Node::Annotation { .. } => "Annotation",
            Node::ArrayPattern(_) => "ArrayPattern",
            Node::ObjectPattern(_) => "ObjectPattern",
            Node::RestPattern(_) => "RestPattern",
            Node::AssignmentPattern { .. } => "AssignmentPattern",
            Node::EmptyPattern => "EmptyPattern",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_as_value_covers_everything_but_template() {
        assert_eq!(Literal::Null.as_value(), Some(Value::Null));
        assert_eq!(Literal::Int(3).as_value(), Some(Value::Int64(3)));
        assert!(Literal::Template(vec![]).as_value().is_none());
    }

    #[test]
    fn children_reports_indexed_entries_for_list_fields() {
        let a = Rc::new(Node::Identifier("a".into()));
        let b = Rc::new(Node::Identifier("b".into()));
        let program = Node::Program(vec![a, b]);
        let kids = program.children();
        assert_eq!(kids.len(), 2);
        assert_eq!(kids[0].0.index, Some(0));
        assert_eq!(kids[1].0.index, Some(1));
    }
}
