//! Entity resolution: matching catalog products to retailer listings
//!
//! Matching is a capability behind the `Matcher` trait so the containment
//! heuristic can later be replaced (fuzzy edit distance, external id lookup)
//! without touching the orchestrator.

use crate::types::{CatalogProduct, RawListing};

/// A resolved listing for one catalog product.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub listing: &'a RawListing,
    /// False when the resolver fell back to the first listing; callers must
    /// treat those as low-confidence guesses, not pricing certainties.
    pub exact: bool,
}

/// Selects the best-matching listing for a catalog product.
///
/// Envisioned variants: exact token containment (shipped), fuzzy edit
/// distance, external id lookup.
pub trait Matcher: Send + Sync {
    /// Pick the best match from `listings`, preserving the adapter's
    /// original order. Returns `None` only when the listing set is empty.
    fn best_match<'a>(
        &self,
        product: &CatalogProduct,
        listings: &'a [RawListing],
    ) -> Option<Match<'a>>;

    fn name(&self) -> &str;
}

/// Token containment matcher.
///
/// A listing matches when its lower-cased name contains both the product's
/// brand token and the first whitespace-delimited word of the product name.
/// The first listing in adapter order satisfying the predicate wins; there
/// is no re-ranking. When nothing matches, the first listing is returned as
/// a reduced-confidence fallback rather than "no match".
#[derive(Debug, Default)]
pub struct TokenContainmentMatcher;

impl TokenContainmentMatcher {
    fn matches(product: &CatalogProduct, listing: &RawListing) -> bool {
        let haystack = listing.name.to_lowercase();
        let brand = product.brand.to_lowercase();
        let first_word = product
            .name
            .split_whitespace()
            .next()
            .map(str::to_lowercase)
            .unwrap_or_default();

        if brand.is_empty() || first_word.is_empty() {
            return false;
        }
        haystack.contains(&brand) && haystack.contains(&first_word)
    }
}

impl Matcher for TokenContainmentMatcher {
    fn best_match<'a>(
        &self,
        product: &CatalogProduct,
        listings: &'a [RawListing],
    ) -> Option<Match<'a>> {
        if let Some(listing) = listings.iter().find(|l| Self::matches(product, l)) {
            return Some(Match {
                listing,
                exact: true,
            });
        }

        // Fallback: first listing, tagged as a guess.
        listings.first().map(|listing| Match {
            listing,
            exact: false,
        })
    }

    fn name(&self) -> &str {
        "token_containment"
    }
}
