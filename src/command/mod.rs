pub mod manipulate;
