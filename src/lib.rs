pub mod clustermap;
pub mod test_util;
