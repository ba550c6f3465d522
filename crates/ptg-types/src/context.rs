use std::fmt::Write as _;

/// Index of a task class in the registry (Component B). Stable for the
/// lifetime of the process once the registry is frozen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub u32);

/// A task-class pointer plus an assignment of integers to that class's
/// locals. Equality is structural; contexts are small value objects that
/// never own data buffers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExecutionContext {
    pub class: ClassId,
    pub locals: Vec<i64>,
}

impl ExecutionContext {
    pub fn new(class: ClassId, locals: Vec<i64>) -> Self {
        Self { class, locals }
    }

    /// Writes `CLASSNAME(l0,l1,...)` into `buf`, truncating at `buf`'s
    /// capacity rather than reallocating — callers that format on a hot
    /// path (logging from the release engine) pass a reusable buffer.
    pub fn format_into(&self, class_name: &str, buf: &mut String) {
        buf.clear();
        let _ = write!(buf, "{class_name}(");
        for (i, v) in self.locals.iter().enumerate() {
            if i > 0 {
                let _ = write!(buf, ",");
            }
            let _ = write!(buf, "{v}");
        }
        let _ = write!(buf, ")");
    }

    pub fn display(&self, class_name: &str) -> String {
        let mut s = String::new();
        self.format_into(class_name, &mut s);
        s
    }
}

/// Formats `SRC(..)→DST(..)` for an edge between two contexts, the form
/// used in logs and the S1–S6 scenario tests.
pub fn format_edge(
    src_name: &str,
    src: &ExecutionContext,
    dst_name: &str,
    dst: &ExecutionContext,
    buf: &mut String,
) {
    buf.clear();
    let _ = write!(buf, "{}→{}", src.display(src_name), dst.display(dst_name));
}
