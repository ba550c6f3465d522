use crate::expr::Expr;
use serde::{Deserialize, Serialize};

/// Whether a symbol is bound once per program (`Global`) or is one of a
/// task class's locals (`Local`), which the enumerator walks in
/// declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Global,
    Local,
}

/// An integer-valued name with an optional declared bound.
///
/// For a `Local`, `lower`/`upper` are expressions over the locals that
/// precede it in declaration order — this is what makes the dependency
/// array (Component D) ragged: a local's range can depend on the values
/// already chosen for earlier locals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub lower: Option<Expr>,
    pub upper: Option<Expr>,
}

impl Symbol {
    pub fn local(name: impl Into<String>, lower: Expr, upper: Expr) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Local,
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Global,
            lower: None,
            upper: None,
        }
    }
}

/// Read/write mode of a task-class parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

/// An opaque handle naming a wire datatype (e.g. a tile shape). The
/// runtime never interprets it — it is handed back to the transport
/// layer and to the data descriptor as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatatypeId(pub u32);

/// Named input or output of a task class.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub mode: AccessMode,
    pub datatype: DatatypeId,
}
