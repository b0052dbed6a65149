//! Route-level payment configuration.

use crate::server::context::PricingContext;

/// A route term that is either fixed or resolved per request.
///
/// `FromContext` values are read from the request's [`PricingContext`]
/// extension, set by an upstream collaborator before the payment gate runs;
/// when no context was established, the variant's fallback applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// A fixed value configured on the route.
    Static(String),
    /// Resolved from the request-scoped [`PricingContext`].
    FromContext {
        /// Value used when no pricing context was established upstream.
        fallback: String,
    },
}

impl ConfigValue {
    /// Resolves the effective value given the context-provided one, if any.
    #[must_use]
    pub fn resolve<'a>(&'a self, from_context: Option<&'a str>) -> &'a str {
        match self {
            Self::Static(value) => value,
            Self::FromContext { fallback } => from_context.unwrap_or(fallback),
        }
    }
}

/// Payment terms for one protected route.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Amount charged per request, in base units.
    pub amount: ConfigValue,
    /// Recipient address for the payment.
    pub pay_to: ConfigValue,
    /// Asset the route charges in.
    pub asset: String,
    /// Network the payment must settle on.
    pub network: String,
}

impl RouteConfig {
    /// Creates a route configuration.
    #[must_use]
    pub fn new(
        amount: ConfigValue,
        pay_to: ConfigValue,
        asset: impl Into<String>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            pay_to,
            asset: asset.into(),
            network: network.into(),
        }
    }

    /// The effective amount for a request, honoring any pricing context.
    #[must_use]
    pub fn effective_amount<'a>(&'a self, pricing: Option<&'a PricingContext>) -> &'a str {
        self.amount
            .resolve(pricing.and_then(|p| p.amount.as_deref()))
    }

    /// The effective recipient for a request, honoring any pricing context.
    #[must_use]
    pub fn effective_pay_to<'a>(&'a self, pricing: Option<&'a PricingContext>) -> &'a str {
        self.pay_to
            .resolve(pricing.and_then(|p| p.pay_to.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_value_ignores_context() {
        let value = ConfigValue::Static("1000000".to_owned());
        assert_eq!(value.resolve(Some("5")), "1000000");
        assert_eq!(value.resolve(None), "1000000");
    }

    #[test]
    fn from_context_prefers_context_and_falls_back() {
        let value = ConfigValue::FromContext {
            fallback: "1000000".to_owned(),
        };
        assert_eq!(value.resolve(Some("250000")), "250000");
        assert_eq!(value.resolve(None), "1000000");
    }

    #[test]
    fn route_resolves_amount_and_recipient_independently() {
        let route = RouteConfig::new(
            ConfigValue::FromContext {
                fallback: "1000000".to_owned(),
            },
            ConfigValue::Static("W".to_owned()),
            "USDC",
            "solana-devnet",
        );
        let pricing = PricingContext {
            amount: Some("42".to_owned()),
            pay_to: Some("OTHER".to_owned()),
        };
        assert_eq!(route.effective_amount(Some(&pricing)), "42");
        // payTo is static on this route, so the context does not apply.
        assert_eq!(route.effective_pay_to(Some(&pricing)), "W");
        assert_eq!(route.effective_amount(None), "1000000");
    }
}
