//! Middleware chain execution
//!
//! Each interception point holds an ordered list of links. Dispatch walks
//! the list by index: every continuation is built knowing the position of
//! its successor, so a plugin registered twice at one point runs twice and
//! each occurrence resumes at the right place.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde_json::Value;

use drydock_abi::{CoreApi, MiddlewareContext, Next};

use crate::loader::LoadedModule;

/// One registered handler at an interception point.
#[derive(Clone)]
pub(crate) struct ChainLink {
    pub plugin_id: String,
    pub module: Arc<LoadedModule>,
}

/// Run the link at `index`, handing it a continuation into `index + 1`.
///
/// Past the end of the chain the data is returned unchanged. A link that
/// never invokes its continuation terminates the chain with whatever it
/// returns.
pub(crate) fn invoke_link(
    chain: Arc<Vec<ChainLink>>,
    index: usize,
    point: String,
    api: CoreApi,
    data: Value,
) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move {
        if index >= chain.len() {
            return Ok(data);
        }
        let link = chain[index].clone();

        let next = {
            let chain = Arc::clone(&chain);
            let point = point.clone();
            let api = api.clone();
            Next::new(move |data| invoke_link(chain, index + 1, point, api, data))
        };

        let cx = MiddlewareContext {
            point: point.clone(),
            data,
            api,
            next,
        };
        link.module
            .instance
            .process(cx)
            .await
            .with_context(|| format!("middleware '{}' failed at point '{point}'", link.plugin_id))
    })
}
