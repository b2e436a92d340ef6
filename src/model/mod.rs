mod blocks;
mod error;
mod two_legged;
mod unet;

pub use blocks::{
    ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock, EncoderBlockConfig,
};
pub use error::ModelConfigError;
pub use two_legged::{TwoLeggedUNet, TwoLeggedUNetConfig};
pub use unet::{UNet, UNetConfig};
