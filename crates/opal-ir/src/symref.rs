//! Symbol references: numbered handles through which OIR nodes address
//! symbols. Two references with the same underlying symbol and offset denote
//! the same storage; the optimizer builds a correspondence table for that
//! query.

/// Index of a symbol in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

/// Index of a symbol reference in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymRefId(pub u32);

impl SymRefId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One symbol reference: a (symbol, offset) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolReference {
    pub symbol: SymbolId,
    pub offset: i64,
}

/// The per-compilation symbol-reference table. Growth of `len()` is an
/// invalidation trigger for alias info and the correspondence table.
#[derive(Debug, Default)]
pub struct SymbolReferenceTable {
    symbols: Vec<String>,
    refs: Vec<SymbolReference>,
}

impl SymbolReferenceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_symbol(&mut self, name: impl Into<String>) -> SymbolId {
        let id = SymbolId(u32::try_from(self.symbols.len()).expect("symbol table overflow"));
        self.symbols.push(name.into());
        id
    }

    pub fn create_symref(&mut self, symbol: SymbolId, offset: i64) -> SymRefId {
        let id = SymRefId(u32::try_from(self.refs.len()).expect("symref table overflow"));
        self.refs.push(SymbolReference { symbol, offset });
        id
    }

    /// Convenience: a fresh symbol with one reference at offset 0.
    pub fn create_named(&mut self, name: impl Into<String>) -> SymRefId {
        let symbol = self.create_symbol(name);
        self.create_symref(symbol, 0)
    }

    #[must_use]
    pub fn symref(&self, id: SymRefId) -> &SymbolReference {
        &self.refs[id.index()]
    }

    #[must_use]
    pub fn symbol_name(&self, id: SymbolId) -> &str {
        &self.symbols[id.0 as usize]
    }

    /// Number of symbol references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymRefId, &SymbolReference)> {
        self.refs
            .iter()
            .enumerate()
            .map(|(i, r)| (SymRefId(i as u32), r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_refs_one_symbol() {
        let mut table = SymbolReferenceTable::new();
        let sym = table.create_symbol("field");
        let a = table.create_symref(sym, 0);
        let b = table.create_symref(sym, 0);
        let c = table.create_symref(sym, 8);
        assert_ne!(a, b);
        assert_eq!(table.symref(a), table.symref(b));
        assert_ne!(table.symref(a), table.symref(c));
        assert_eq!(table.len(), 3);
    }
}
