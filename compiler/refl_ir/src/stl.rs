//! Recognition of standard-library containers and strings by name.

/// Standard containers the streamer generator knows how to transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StlKind {
    Vector,
    List,
    Deque,
    ForwardList,
    Set,
    MultiSet,
    UnorderedSet,
    UnorderedMultiSet,
    Map,
    MultiMap,
    UnorderedMap,
    UnorderedMultiMap,
}

/// How elements are put back into a container while reading.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Insertion {
    PushBack,
    PushFront,
    Insert,
}

impl StlKind {
    /// Classify a template name such as `std::vector` or `map`.
    pub fn from_template_name(name: &str) -> Option<StlKind> {
        let kind = match strip_std(name) {
            "vector" => StlKind::Vector,
            "list" => StlKind::List,
            "deque" => StlKind::Deque,
            "forward_list" => StlKind::ForwardList,
            "set" => StlKind::Set,
            "multiset" => StlKind::MultiSet,
            "unordered_set" => StlKind::UnorderedSet,
            "unordered_multiset" => StlKind::UnorderedMultiSet,
            "map" => StlKind::Map,
            "multimap" => StlKind::MultiMap,
            "unordered_map" => StlKind::UnorderedMap,
            "unordered_multimap" => StlKind::UnorderedMultiMap,
            _ => return None,
        };
        Some(kind)
    }

    /// Classify a full instance name such as `std::vector<int>`.
    pub fn of_instance(name: &str) -> Option<StlKind> {
        let (base, _) = crate::types::split_template(name)?;
        StlKind::from_template_name(base)
    }

    pub fn template_name(self) -> &'static str {
        match self {
            StlKind::Vector => "vector",
            StlKind::List => "list",
            StlKind::Deque => "deque",
            StlKind::ForwardList => "forward_list",
            StlKind::Set => "set",
            StlKind::MultiSet => "multiset",
            StlKind::UnorderedSet => "unordered_set",
            StlKind::UnorderedMultiSet => "unordered_multiset",
            StlKind::Map => "map",
            StlKind::MultiMap => "multimap",
            StlKind::UnorderedMap => "unordered_map",
            StlKind::UnorderedMultiMap => "unordered_multimap",
        }
    }

    pub fn is_map(self) -> bool {
        matches!(
            self,
            StlKind::Map | StlKind::MultiMap | StlKind::UnorderedMap | StlKind::UnorderedMultiMap
        )
    }

    /// Number of template arguments that are not defaulted
    /// (allocators, comparators, hashers are dropped from normalized names).
    pub fn essential_args(self) -> usize {
        if self.is_map() {
            2
        } else {
            1
        }
    }

    pub fn insertion(self) -> Insertion {
        match self {
            StlKind::Vector | StlKind::List | StlKind::Deque => Insertion::PushBack,
            StlKind::ForwardList => Insertion::PushFront,
            _ => Insertion::Insert,
        }
    }

    /// Whether the container can pre-allocate before reading elements.
    pub fn can_reserve(self) -> bool {
        matches!(
            self,
            StlKind::Vector
                | StlKind::UnorderedSet
                | StlKind::UnorderedMultiSet
                | StlKind::UnorderedMap
                | StlKind::UnorderedMultiMap
        )
    }

    /// Runtime collection-kind tag written into registration code.
    pub fn collection_tag(self) -> &'static str {
        match self {
            StlKind::Vector => "kVector",
            StlKind::List => "kList",
            StlKind::Deque => "kDeque",
            StlKind::ForwardList => "kForwardList",
            StlKind::Set => "kSet",
            StlKind::MultiSet => "kMultiSet",
            StlKind::UnorderedSet => "kUnorderedSet",
            StlKind::UnorderedMultiSet => "kUnorderedMultiSet",
            StlKind::Map => "kMap",
            StlKind::MultiMap => "kMultiMap",
            StlKind::UnorderedMap => "kUnorderedMap",
            StlKind::UnorderedMultiMap => "kUnorderedMultiMap",
        }
    }
}

/// Remove a leading `::` and `std::` qualification.
pub fn strip_std(name: &str) -> &str {
    let name = name.strip_prefix("::").unwrap_or(name);
    name.strip_prefix("std::").unwrap_or(name)
}

/// Whether a spelled name denotes the standard narrow string.
pub fn is_std_string(name: &str) -> bool {
    let bare = strip_std(name);
    if bare == "string" {
        return true;
    }
    match crate::types::split_template(bare) {
        Some(("basic_string", args)) => args.first().is_some_and(|arg| *arg == "char"),
        _ => false,
    }
}

/// Standard templates whose instances never need a dictionary entry of
/// their own: selecting them explicitly is pointless.
pub fn is_selection_unnecessary(normalized: &str) -> bool {
    normalized.starts_with("array<") || normalized.starts_with("unique_ptr<")
}

/// Standard facilities the runtime cannot stream at all.
pub fn is_unsupported_std(normalized: &str) -> bool {
    normalized == "regex"
        || normalized.starts_with("regex<")
        || normalized == "thread"
        || normalized.starts_with("chrono:")
        || normalized.starts_with("ratio<")
        || normalized.starts_with("shared_ptr<")
}
