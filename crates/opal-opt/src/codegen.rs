//! The seam between the optimization pipeline and a backend.

use opal_core::Result;

use crate::compilation::Compilation;
use crate::optimizer::Optimizer;

/// A machine-specific backend. The pipeline itself stays machine-independent;
/// everything target-shaped lives behind this trait.
pub trait CodeGenerator {
    type Output;

    /// Lowers the optimized compilation. `total_cost` is the accumulated
    /// transformation and analysis cost reported by the driver.
    fn generate(&mut self, comp: &Compilation, total_cost: i32) -> Result<Self::Output>;
}

/// Runs the tier-selected strategy, then hands the compilation to `backend`.
pub fn compile<G: CodeGenerator>(comp: &mut Compilation, backend: &mut G) -> Result<G::Output> {
    let cost = Optimizer::new(comp).optimize()?;
    backend.generate(comp, cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_core::CompileOptions;
    use opal_ir::{ConstValue, MethodInfo, OpCode};

    struct TreeCounter;

    impl CodeGenerator for TreeCounter {
        type Output = (usize, i32);

        fn generate(&mut self, comp: &Compilation, total_cost: i32) -> Result<Self::Output> {
            let trees = comp
                .cfg
                .live_block_ids()
                .map(|b| comp.cfg.block(b).trees.len())
                .sum();
            Ok((trees, total_cost))
        }
    }

    #[test]
    fn test_backend_sees_the_optimized_method() {
        let mut comp = Compilation::new(MethodInfo::new("m"), CompileOptions::default());
        let sr = comp.symrefs.create_named("x");
        let entry = comp.cfg.entry();
        let two = comp.pool.create_const(ConstValue::Int32(2));
        let three = comp.pool.create_const(ConstValue::Int32(3));
        let sum = comp.pool.create_binary(OpCode::Add, two, three);
        let store = comp.pool.create_store(sr, sum);
        comp.cfg.block_mut(entry).trees.push(store);

        let (trees, cost) = compile(&mut comp, &mut TreeCounter).unwrap();
        assert_eq!(trees, 1);
        assert!(cost > 0);
    }
}
