pub mod fold_results;
