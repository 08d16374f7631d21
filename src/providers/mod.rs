pub mod cryptocompare;

pub use cryptocompare::CryptoCompareSource;
