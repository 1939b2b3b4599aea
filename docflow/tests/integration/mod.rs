mod cluster_test;
mod pipeline_test;
