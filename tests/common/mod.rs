#[allow(dead_code)]
pub mod entities;
#[allow(dead_code)]
pub mod loaders;

#[allow(unused_imports)]
pub use entities::{ts, FareClassKey, FareClassRule, TaxKey, TaxRule};
#[allow(unused_imports)]
pub use loaders::{HistoricalScriptedLoader, ScriptedLoader};
