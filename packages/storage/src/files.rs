pub mod local_dir;

pub use local_dir::LocalDir;
