pub mod i2c;
pub mod image;
pub mod spiflash;
pub mod srzip;
pub mod waveforms;
