pub mod model;

pub use model::{
    ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock, EncoderBlockConfig,
};
pub use model::{ModelConfigError, TwoLeggedUNet, TwoLeggedUNetConfig, UNet, UNetConfig};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
