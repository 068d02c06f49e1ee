//! Cursor/offset pagination over a remote "fetch one page" function.
//!
//! A [`Paginator`] owns the position ([`PageState`]) and exposes four ways of
//! consuming a listing: page by page ([`Paginator::next`]), drain everything
//! ([`Paginator::all`]), a per-item callback ([`Paginator::for_each`]), and a
//! bounded worker pool ([`Paginator::concurrent`]).
//!
//! Cursor mode wins: once any page returns a next cursor, every following
//! request uses it and the offset goes back to 0.

mod concurrent;
mod pager;
mod types;

pub use pager::{PagerState, Paginator};
pub use types::{PageInfo, PageOptions, PageResult, PageState};
