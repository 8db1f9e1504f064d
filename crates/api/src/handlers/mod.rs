pub mod analyses;
