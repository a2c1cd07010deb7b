//! Simple accumulator component
//!
//! A single `f64` that can be reset, added to, queried and printed through
//! actions, so it behaves the same whether the caller shares its locality or
//! not.

use async_trait::async_trait;
use dispatch::{Action, Component, Locality};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;
use types::{ActionId, Gid, Result};

#[derive(Debug, Default)]
pub struct Accumulator {
    value: Mutex<f64>,
}

impl Accumulator {
    pub fn new(initial: f64) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }

    pub fn value(&self) -> f64 {
        *self.value.lock()
    }
}

impl Component for Accumulator {
    const TYPE_NAME: &'static str = "accumulator";
}

/// Reset to zero
pub struct Init;

#[async_trait]
impl Action for Init {
    type Component = Accumulator;
    type Args = ();
    type Output = ();
    const NAME: &'static str = "init";

    async fn invoke(accumulator: Arc<Accumulator>, _: ()) -> Result<()> {
        *accumulator.value.lock() = 0.0;
        Ok(())
    }
}

pub struct Add;

#[async_trait]
impl Action for Add {
    type Component = Accumulator;
    type Args = f64;
    type Output = ();
    const NAME: &'static str = "add";

    async fn invoke(accumulator: Arc<Accumulator>, arg: f64) -> Result<()> {
        *accumulator.value.lock() += arg;
        Ok(())
    }
}

pub struct Query;

#[async_trait]
impl Action for Query {
    type Component = Accumulator;
    type Args = ();
    type Output = f64;
    const NAME: &'static str = "query";

    async fn invoke(accumulator: Arc<Accumulator>, _: ()) -> Result<f64> {
        Ok(accumulator.value())
    }
}

/// Log the current value on the hosting locality and return its rendering
pub struct Print;

#[async_trait]
impl Action for Print {
    type Component = Accumulator;
    type Args = ();
    type Output = String;
    const NAME: &'static str = "print";

    async fn invoke(accumulator: Arc<Accumulator>, _: ()) -> Result<String> {
        let rendered = format!("{}", accumulator.value());
        info!(value = %rendered, "accumulator");
        Ok(rendered)
    }
}

/// Register every accumulator action on `locality`
pub fn register_actions(locality: &Locality) -> Result<Vec<ActionId>> {
    Ok(vec![
        locality.register_action::<Init>()?,
        locality.register_action::<Add>()?,
        locality.register_action::<Query>()?,
        locality.register_action::<Print>()?,
    ])
}

/// Reset the accumulator at `gid`, add `values` in order, then query it
pub async fn accumulate(driver: &Locality, gid: Gid, values: &[f64]) -> Result<f64> {
    driver.invoke::<Init>(gid, ()).get_result().await.into_result()?;
    for value in values {
        driver.invoke::<Add>(gid, *value).get_result().await.into_result()?;
    }
    let total = driver.invoke::<Query>(gid, ()).get_result().await.into_result()?;
    driver.invoke::<Print>(gid, ()).get_result().await.into_result()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{LocalityId, Outcome};

    #[test]
    fn test_scenario_add_then_query() {
        let locality = Locality::builder(LocalityId::new(0))
            .workers(2)
            .build()
            .unwrap();
        register_actions(&locality).unwrap();
        let gid = locality.create_component(Accumulator::default()).unwrap();

        assert_eq!(locality.invoke::<Add>(gid, 3.5).wait(), Outcome::Completed(()));
        assert_eq!(locality.invoke::<Add>(gid, 2.0).wait(), Outcome::Completed(()));
        assert_eq!(locality.invoke::<Query>(gid, ()).wait(), Outcome::Completed(5.5));
        assert_eq!(
            locality.invoke::<Print>(gid, ()).wait(),
            Outcome::Completed("5.5".to_string())
        );

        assert_eq!(locality.invoke::<Init>(gid, ()).wait(), Outcome::Completed(()));
        assert_eq!(locality.invoke::<Query>(gid, ()).wait(), Outcome::Completed(0.0));
        locality.shutdown();
    }

    #[test]
    fn test_action_ids_are_distinct() {
        let locality = Locality::builder(LocalityId::new(0))
            .workers(1)
            .build()
            .unwrap();
        let mut ids = register_actions(&locality).unwrap();
        ids.sort_by_key(|id| id.inner());
        ids.dedup();
        assert_eq!(ids.len(), 4);
        locality.shutdown();
    }
}
