//! Rendered strategy tables, pinned so reordering an entry is a visible diff.

use opal_opt::dump_strategy;
use opal_opt::strategy::{HOT_STRATEGY, WARM_STRATEGY};

#[test]
fn test_hot_strategy_render() {
    insta::assert_snapshot!(dump_strategy(HOT_STRATEGY), @r"
    treeSimplification [Always]
    loopCanonicalizationGroup [IfLoops]
      loopCanonicalization [Always]
      redundantGotoElimination [IfEnabled]
    eachLocalAnalysisPassGroup [Always]
      treeSimplification [Always]
      localValuePropagation [Always]
      localCSE [Always]
      localDeadStoreElimination [Always]
      deadTreesElimination [Always]
    globalValuePropagation [IfMoreThanOneBlock]
    globalDeadStoreGroup [IfMoreThanOneBlock]
      globalDeadStoreElimination [Always]
      deadTreesElimination [Always]
    localValuePropagationGroup [IfEnabled]
      localValuePropagation [Always]
      localCSE [IfEnabled]
    lateLocalGroup [IfMoreThanOneBlock]
      eachLocalAnalysisPassGroup [Always]
        treeSimplification [Always]
        localValuePropagation [Always]
        localCSE [Always]
        localDeadStoreElimination [Always]
        deadTreesElimination [Always]
      basicBlockExtension [IfMoreThanOneBlock]
    deadTreesElimination [Always] !
    ");
}

#[test]
fn test_warm_strategy_render() {
    insta::assert_snapshot!(dump_strategy(WARM_STRATEGY), @r"
    treeSimplification [Always]
    localValuePropagationGroup [IfMoreThanOneBlock]
      localValuePropagation [Always]
      localCSE [IfEnabled]
    eachLocalAnalysisPassGroup [Always]
      treeSimplification [Always]
      localValuePropagation [Always]
      localCSE [Always]
      localDeadStoreElimination [Always]
      deadTreesElimination [Always]
    redundantGotoElimination [IfMoreThanOneBlock]
    deadTreesElimination [Always]
    ");
}
