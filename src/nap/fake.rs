//! In-memory stand-in for the registry site used by the tests

use std::cell::{Cell, RefCell};
use std::io;

use url::Url;

use super::client::{HttpGet, QueryParams};
use crate::error::Result;

struct Route {
    url: String,
    params: Vec<(String, String)>,
    body: String,
}

/// Serves canned pages, picking the route whose required parameters match the most
#[derive(Default)]
pub(crate) struct FakeSite {
    routes: Vec<Route>,
    failures_left: Cell<u32>,
    requests: RefCell<Vec<(String, QueryParams)>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&mut self, url: &str, params: &[(&str, &str)], body: impl Into<String>) {
        self.routes.push(Route {
            url: url.to_string(),
            params: params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            body: body.into(),
        });
    }

    /// Makes the next `count` requests fail with a connection reset
    pub fn fail_next(&self, count: u32) {
        self.failures_left.set(count);
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<(String, QueryParams)> {
        self.requests.borrow().clone()
    }
}

impl HttpGet for FakeSite {
    fn get_text(&self, url: &Url, params: &QueryParams) -> Result<String> {
        self.requests
            .borrow_mut()
            .push((url.to_string(), params.clone()));
        let attempt = self.request_count();

        if self.failures_left.get() > 0 {
            self.failures_left.set(self.failures_left.get() - 1);
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                format!("connection reset (attempt {attempt})"),
            )
            .into());
        }

        self.routes
            .iter()
            .filter(|route| route.url == url.as_str())
            .filter(|route| {
                route
                    .params
                    .iter()
                    .all(|(key, value)| params.get(key) == Some(value.as_str()))
            })
            .max_by_key(|route| route.params.len())
            .map(|route| route.body.clone())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no page for {url}")).into()
            })
    }
}

/// Builds an installations page in the registry's layout: a title row, a group row, the column
/// names, then one row per installation with a trailing options cell
pub(crate) fn allocation_page(
    years: &[&str],
    rows: &[Vec<&str>],
    last_page: Option<usize>,
) -> String {
    let mut html = String::from("<html><body><form name=\"napInstallationForm\">");
    if let Some(last_page) = last_page {
        html.push_str(&format!(
            "<input type=\"hidden\" name=\"resultList.lastPageNumber\" value=\"{last_page}\">"
        ));
    }
    let width = 7 + years.len() + 2;
    html.push_str(&format!(
        "<table id=\"tblNapList\"><tr><td colspan=\"{width}\">Installations</td></tr>\
         <tr><td colspan=\"7\">Installation Info</td><td colspan=\"{}\">Allocation</td>\
         <td rowspan=\"2\">Latest Update</td><td rowspan=\"2\">Options</td></tr><tr>",
        years.len()
    ));
    for name in [
        "Installation ID",
        "Installation Name",
        "Address City",
        "Account Holder Name",
        "Account Status",
        "Permit ID",
        "Status",
    ]
    .iter()
    .chain(years)
    {
        html.push_str(&format!("<td>{name}</td>"));
    }
    html.push_str("</tr>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{cell}</td>"));
        }
        html.push_str("<td><a href=\"#\">Details</a></td></tr>");
    }
    html.push_str("</table></form></body></html>");
    html
}
