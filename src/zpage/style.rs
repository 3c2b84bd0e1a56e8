//! Shared CSS for zPages.

/// Styles applied to every generated zPage.
pub(crate) const ZPAGE_CSS: &str = concat!(
    "body{font-family: \"Roboto\", sans-serif; font-size: 14px;",
    "background-color: #F2F4EC;}",
    "h1{color: #363636; text-align: center; margin-bottom: 20px;}",
    "p{padding: 0 0.5em; color: #4a4a4a;}",
    "tr.bg-color{background-color: #4b5fab;}",
    "table{margin: 0 auto;}",
    "th{padding: 0 1em; line-height: 2.0}",
    "td{padding: 0 1em; line-height: 2.0}",
    ".border-right-white{border-right: 1px solid #fff;}",
    ".border-left-white{border-left: 1px solid #fff;}",
    ".border-left-dark{border-left: 1px solid #363636;}",
    "th.header-text{color: #fff; line-height: 3.0;}",
    "td.align-center{text-align: center;}",
    "td.bg-white{background-color: #fff;}",
);
