pub mod parcl_labs;

pub use parcl_labs::ParclLabsClient;
