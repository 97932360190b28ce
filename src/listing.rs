/// Instruction text generated for one method, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    // None for the entry point
    pub class: Option<String>,
    pub method: String,
    lines: Vec<String>,
}

impl Listing {
    pub fn new(class: Option<&str>, method: &str) -> Self {
        Listing {
            class: class.map(str::to_string),
            method: method.to_string(),
            lines: Vec::new(),
        }
    }

    /// `_<Class>_<method>` for methods, `_main` for the entry point.
    pub fn entry_label(&self) -> String {
        match &self.class {
            Some(class) => method_label(class, &self.method),
            None => "_main".to_string(),
        }
    }

    pub fn label(&mut self, name: &str) {
        self.lines.push(format!("{}:", name));
    }

    pub fn instruction(&mut self, text: impl Into<String>) {
        self.lines.push(format!("    {}", text.into()));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Instructions only, without indentation, labels dropped.
    pub fn instructions(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|line| line.starts_with("    "))
            .map(|line| line.trim_start())
    }

    pub fn text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

pub fn method_label(class: &str, method: &str) -> String {
    format!("_{}_{}", class, method)
}

// fixed labels of the entry point and the runtime helpers
pub const RUNTIME_LABELS: [&str; 8] = [
    "_main",
    "_print_int",
    "_print_int_digits",
    "_print_int_loop",
    "_print_int_write",
    "_print_string",
    "_print_string_length",
    "_print_string_write",
];

const CONTROL_PREFIXES: [&str; 3] = ["_else_statement_", "_while_condition_", "_while_exit_"];

/// True for labels the compiler makes up itself, which user methods must not take.
pub fn is_generated_label(label: &str) -> bool {
    if RUNTIME_LABELS.contains(&label) {
        return true;
    }
    CONTROL_PREFIXES.iter().any(|prefix| {
        label
            .strip_prefix(prefix)
            .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    pub label: String,
    // without the trailing newline and NUL, the emitter adds those
    pub bytes: Vec<u8>,
}

/// String storage. Append-only; labels are unique.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DataSection {
    entries: Vec<DataEntry>,
    // labels already used in the text segment
    reserved: Vec<String>,
}

impl DataSection {
    pub fn new() -> Self {
        DataSection::default()
    }

    /// Keep `label` out of the data section.
    pub fn reserve(&mut self, label: &str) {
        self.reserved.push(label.to_string());
    }

    pub fn is_taken(&self, label: &str) -> bool {
        self.get(label).is_some() || self.reserved.iter().any(|taken| taken == label)
    }

    /// Store `bytes` under `label`, or under `label_<n>` if that label is taken.
    /// Returns the label actually used.
    pub fn insert(&mut self, label: &str, bytes: Vec<u8>) -> String {
        let mut unique = label.to_string();
        let mut suffix = 1;
        while self.is_taken(&unique) {
            suffix += 1;
            unique = format!("{}_{}", label, suffix);
        }
        self.entries.push(DataEntry {
            label: unique.clone(),
            bytes,
        });
        unique
    }

    pub fn get(&self, label: &str) -> Option<&DataEntry> {
        self.entries.iter().find(|entry| entry.label == label)
    }

    pub fn entries(&self) -> &[DataEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
