//! Row selection over the cleaned listings.
//!
//! An unset categorical facet still requires a non-null value: "unset" shows
//! every explicitly valued row, it does not ignore the column.

use std::collections::BTreeSet;

use crate::types::{Facet, FacetSelection, Listing};

pub fn matches(listing: &Listing, selection: &FacetSelection) -> bool {
    selection.engine_size.contains(listing.engine_size)
        && selection
            .circulation_year
            .contains(listing.circulation_year.map(f64::from))
        && selection.price.contains(listing.price)
        && categorical(listing.brand.as_deref(), selection.brand.as_deref())
        && categorical(listing.category.as_deref(), selection.category.as_deref())
        && categorical(listing.location.as_deref(), selection.location.as_deref())
        && membership(listing.model.as_deref(), selection.models.as_deref())
}

pub fn select<'a>(listings: &'a [Listing], selection: &FacetSelection) -> Vec<&'a Listing> {
    listings.iter().filter(|l| matches(l, selection)).collect()
}

/// Choices for one dropdown: the predicate is re-run with that facet unset so a
/// dropdown never narrows its own list, while every other selection still applies.
pub fn options_for(listings: &[Listing], selection: &FacetSelection, facet: Facet) -> Vec<String> {
    let relaxed = selection.without(facet);
    listings
        .iter()
        .filter(|l| matches(l, &relaxed))
        .filter_map(|l| facet.value(l))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn categorical(value: Option<&str>, wanted: Option<&str>) -> bool {
    match (value, wanted) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(v), Some(w)) => v == w,
    }
}

fn membership(value: Option<&str>, wanted: Option<&[String]>) -> bool {
    match (value, wanted) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(v), Some(list)) => list.iter().any(|m| m == v),
    }
}
