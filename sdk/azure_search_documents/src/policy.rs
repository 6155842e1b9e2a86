use crate::version::{SearchServiceVersion, API_VERSION_PARAM};
use azure_rest_core::error::ServiceResult;
use azure_rest_core::pipeline::{Context, Next, Policy, Request, Response};

/// Adds `api-version` to every request that does not carry one yet.
///
/// Continuation links issued by the service already include the parameter
/// and are left as they are.
#[derive(Debug, Clone, Copy)]
pub struct ApiVersionPolicy {
    version: SearchServiceVersion,
}

impl ApiVersionPolicy {
    pub fn new(version: SearchServiceVersion) -> Self {
        Self { version }
    }
}

#[async_trait::async_trait]
impl Policy for ApiVersionPolicy {
    async fn send(
        &self,
        ctx: &Context,
        request: &mut Request,
        next: Next<'_>,
    ) -> ServiceResult<Response> {
        let present = request
            .url()
            .query_pairs()
            .any(|(key, _)| key == API_VERSION_PARAM);
        if !present {
            request.append_query(API_VERSION_PARAM, self.version.as_str());
        }
        next.run(ctx, request).await
    }
}
