//! `meridian catalog`

use anyhow::Result;
use meridian_core::BrokerConfig;
use meridian_plans::Catalog;

pub fn run(config: &BrokerConfig) -> Result<()> {
    let resolver = super::build_resolver(config)?;
    let catalog = Catalog::build(&resolver, &config.service);
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}
