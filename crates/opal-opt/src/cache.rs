//! The analysis cache: single point of truth for which derived analyses are
//! valid right now.
//!
//! Each entry is built lazily, owned exclusively by the driver, and dropped
//! when invalidated; setters log the invalidation to the opt-details
//! transcript. Build failures are best-effort: the cache stays empty and the
//! requesting pass runs without the analysis.

use opal_ir::{NodeId, SymRefId, SymbolReferenceTable};

use crate::analysis::use_def::UseDefInfo;
use crate::analysis::value_number::{ValueNumberInfo, VnBuildType};
use crate::compilation::Compilation;

pub const STRUCTURE_COST: i32 = 10;
pub const USE_DEF_COST: i32 = 10;
pub const VALUE_NUMBER_COST: i32 = 10;
pub const ALIAS_SETS_COST: i32 = 1;

pub struct AnalysisCache {
    use_def: Option<UseDefInfo>,
    value_number: Option<ValueNumberInfo>,
    alias_sets_valid: bool,
    /// Correspondence table: for each symbol reference, every reference
    /// naming the same storage (same symbol and offset).
    sym_references: Option<Vec<Vec<SymRefId>>>,
    cant_build_use_def: bool,
    cant_build_value_number: bool,
    vn_build_type: VnBuildType,
}

impl AnalysisCache {
    #[must_use]
    pub fn new(vn_build_type: VnBuildType) -> Self {
        Self {
            use_def: None,
            value_number: None,
            alias_sets_valid: false,
            sym_references: None,
            cant_build_use_def: false,
            cant_build_value_number: false,
            vn_build_type,
        }
    }

    #[must_use]
    pub fn vn_build_type(&self) -> VnBuildType {
        self.vn_build_type
    }

    #[must_use]
    pub fn use_def(&self) -> Option<&UseDefInfo> {
        self.use_def.as_ref()
    }

    /// Installs or drops use-def info. Dropping a live instance logs the
    /// invalidation.
    pub fn set_use_def(&mut self, info: Option<UseDefInfo>, comp: &mut Compilation) {
        if info.is_none() && self.use_def.is_some() {
            comp.dump_opt_details("invalidated use-def info");
        }
        self.use_def = info;
    }

    #[must_use]
    pub fn value_number(&self) -> Option<&ValueNumberInfo> {
        self.value_number.as_ref()
    }

    pub fn set_value_number(&mut self, info: Option<ValueNumberInfo>, comp: &mut Compilation) {
        if info.is_none() && self.value_number.is_some() {
            comp.dump_opt_details("invalidated value-number info");
        }
        self.value_number = info;
    }

    #[must_use]
    pub fn alias_sets_valid(&self) -> bool {
        self.alias_sets_valid
    }

    /// Rebuilds alias sets and the symbol-reference correspondence table.
    pub fn rebuild_alias_sets(&mut self, symrefs: &SymbolReferenceTable) {
        self.sym_references = Some(build_sym_references(symrefs));
        self.alias_sets_valid = true;
    }

    pub fn invalidate_alias_sets(&mut self, comp: &mut Compilation) {
        if self.alias_sets_valid {
            comp.dump_opt_details("invalidated alias sets");
        }
        self.alias_sets_valid = false;
    }

    /// References naming the same storage as `id`, `id` included. Lazily
    /// built from the symbol-reference table.
    pub fn sym_references_table(&mut self, symrefs: &SymbolReferenceTable) -> &[Vec<SymRefId>] {
        if self.sym_references.is_none() {
            self.sym_references = Some(build_sym_references(symrefs));
        }
        self.sym_references.as_deref().unwrap_or(&[])
    }

    /// Dropped when the symbol-reference table grows; rebuilt on next use.
    pub fn invalidate_sym_references(&mut self) {
        self.sym_references = None;
    }

    #[must_use]
    pub fn cant_build_use_def(&self) -> bool {
        self.cant_build_use_def
    }

    pub fn set_cant_build_use_def(&mut self, value: bool) {
        self.cant_build_use_def = value;
    }

    #[must_use]
    pub fn cant_build_value_number(&self) -> bool {
        self.cant_build_value_number
    }

    pub fn set_cant_build_value_number(&mut self, value: bool) {
        self.cant_build_value_number = value;
    }

    /// Patches the cached analyses before a pass deletes a node, so stale
    /// chains never point at a tombstone.
    pub fn prepare_for_node_removal(&mut self, node: NodeId) {
        if let Some(info) = &mut self.use_def {
            info.remove_node(node);
        }
        if let Some(info) = &mut self.value_number {
            info.remove_node(node);
        }
    }
}

fn build_sym_references(symrefs: &SymbolReferenceTable) -> Vec<Vec<SymRefId>> {
    let all: Vec<(SymRefId, _)> = symrefs.iter().collect();
    all.iter()
        .map(|(_, this)| {
            all.iter()
                .filter(|(_, other)| other == this)
                .map(|(id, _)| *id)
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_core::CompileOptions;
    use opal_ir::MethodInfo;

    fn comp() -> Compilation {
        let mut comp = Compilation::new(MethodInfo::new("m"), CompileOptions::default());
        comp.options.trace_opt_details = true;
        comp
    }

    #[test]
    fn test_dropping_live_use_def_logs() {
        let mut comp = comp();
        let mut cache = AnalysisCache::new(VnBuildType::Hash);

        // empty-to-empty is silent
        cache.set_use_def(None, &mut comp);
        assert!(comp.opt_details().is_empty());

        let info = UseDefInfo::build(&comp, false, false).unwrap();
        cache.set_use_def(Some(info), &mut comp);
        cache.set_use_def(None, &mut comp);
        assert_eq!(comp.opt_details(), ["invalidated use-def info"]);
    }

    #[test]
    fn test_correspondence_table_groups_same_storage() {
        let comp = {
            let mut comp = comp();
            let sym = comp.symrefs.create_symbol("field");
            comp.symrefs.create_symref(sym, 0);
            comp.symrefs.create_symref(sym, 0);
            comp.symrefs.create_symref(sym, 8);
            comp
        };
        let mut cache = AnalysisCache::new(VnBuildType::Hash);
        let table = cache.sym_references_table(&comp.symrefs);
        assert_eq!(table[0], vec![SymRefId(0), SymRefId(1)]);
        assert_eq!(table[1], vec![SymRefId(0), SymRefId(1)]);
        assert_eq!(table[2], vec![SymRefId(2)]);
    }

    #[test]
    fn test_alias_rebuild_restores_validity() {
        let mut comp = comp();
        let mut cache = AnalysisCache::new(VnBuildType::Hash);
        assert!(!cache.alias_sets_valid());
        cache.rebuild_alias_sets(&comp.symrefs);
        assert!(cache.alias_sets_valid());
        cache.invalidate_alias_sets(&mut comp);
        assert!(!cache.alias_sets_valid());
        assert_eq!(comp.opt_details(), ["invalidated alias sets"]);
    }
}
