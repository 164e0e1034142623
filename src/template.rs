//! Renders a [`RenderContext`] into the explorer HTML page.

use std::io::Write;

use crate::page_state::{RenderContext, Transport};

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),
    #[error("rendered page is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Global the data script assigns and the bootstrap script reads.
pub const PAGE_STATE_GLOBAL: &str = "GRAPHIQL_PAGE_STATE";

const PREAMBLE: &str = r#"<!DOCTYPE html>
<!--
  This GraphQL endpoint answered with an in-browser explorer because the
  request accepted text/html. Send "Accept: application/json", or add "&raw"
  to the URL, to get the JSON result instead.
-->
<html>
<head>
  <meta charset="utf-8" />
  <title>GraphiQL</title>
  <meta name="robots" content="noindex" />
  <style>
    html, body {
      height: 100%;
      margin: 0;
      overflow: hidden;
      width: 100%;
    }
  </style>
"#;

const BODY_OPEN: &str = "</head>\n<body>\n";

const DOCUMENT_CLOSE: &str = "</body>\n</html>\n";

// Reads the page state, keeps the URL in sync with the editors and mounts
// GraphiQL. Must stay free of template placeholders.
const BOOTSTRAP_SCRIPT: &str = r#"  <script>
    (function (page) {
      var RESERVED = { query: true, variables: true, operationName: true };

      function decode(component) {
        try {
          return decodeURIComponent(component);
        } catch (error) {
          return null;
        }
      }

      function parseParameters(search) {
        var parsed = { parameters: Object.create(null), verbatim: [] };
        search.replace(/^\?/, '').split('&').forEach(function (entry) {
          var eq = entry.indexOf('=');
          if (eq < 0) {
            return;
          }
          var key = decode(entry.slice(0, eq));
          var value = decode(entry.slice(eq + 1));
          if (key !== null && value !== null) {
            parsed.parameters[key] = value;
          } else if (key === null || RESERVED[key] !== true) {
            parsed.verbatim.push(entry);
          }
        });
        return parsed;
      }

      function locationQuery(params, verbatim, location) {
        var entries = Object.keys(params).map(function (key) {
          return encodeURIComponent(key) + '=' + encodeURIComponent(params[key]);
        }).concat(verbatim);
        return (location ? location : '') + '?' + entries.join('&');
      }

      function passThrough(params) {
        var other = Object.create(null);
        Object.keys(params).forEach(function (key) {
          if (RESERVED[key] !== true) {
            other[key] = params[key];
          }
        });
        return other;
      }

      var parsed = parseParameters(window.location.search);
      var state = {
        parameters: parsed.parameters,
        verbatim: parsed.verbatim,
        onEditQuery: function (newQuery) {
          state.parameters.query = newQuery;
          state.syncURL();
        },
        onEditVariables: function (newVariables) {
          state.parameters.variables = newVariables;
          state.syncURL();
        },
        onEditOperationName: function (newOperationName) {
          state.parameters.operationName = newOperationName;
          state.syncURL();
        },
        syncURL: function () {
          history.replaceState(null, null, locationQuery(state.parameters, state.verbatim));
        }
      };

      var subscriptionsClient = null;
      if (page.subscriptionsEndpoint) {
        subscriptionsClient = new window.SubscriptionsTransportWs.SubscriptionClient(
          page.subscriptionsEndpoint,
          { reconnect: true }
        );
      }

      var fetchURL = locationQuery(passThrough(state.parameters), state.verbatim, page.endpoint);

      function graphQLHttpFetcher(graphQLParams) {
        return fetch(fetchURL, {
          method: 'post',
          headers: {
            'Accept': 'application/json',
            'Content-Type': 'application/json'
          },
          body: JSON.stringify(graphQLParams),
          credentials: 'include'
        }).then(function (response) {
          return response.text();
        }).then(function (responseBody) {
          try {
            return JSON.parse(responseBody);
          } catch (error) {
            return responseBody;
          }
        }, function (error) {
          return { errors: [{ message: String(error) }] };
        });
      }

      var fetcher = graphQLHttpFetcher;
      if (subscriptionsClient) {
        fetcher = window.GraphiQLSubscriptionsFetcher.graphQLFetcher(
          subscriptionsClient,
          graphQLHttpFetcher
        );
      }

      ReactDOM.render(
        React.createElement(GraphiQL, {
          fetcher: fetcher,
          onEditQuery: state.onEditQuery,
          onEditVariables: state.onEditVariables,
          onEditOperationName: state.onEditOperationName,
          query: page.query,
          response: page.response,
          variables: page.variables,
          operationName: page.operationName
        }),
        document.body
      );
    })(window.GRAPHIQL_PAGE_STATE);
  </script>
"#;

/// Renders the page into a buffer and returns it only if every write
/// succeeded.
pub fn render(ctx: &RenderContext) -> Result<String, TemplateError> {
    let mut buf = Vec::with_capacity(8 * 1024);
    render_to(ctx, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Streams the page into `out`. On error, whatever reached `out` is
/// incomplete and must be discarded by the caller.
pub fn render_to<W: Write>(ctx: &RenderContext, out: &mut W) -> Result<(), TemplateError> {
    let versions = ctx.versions();
    let graphiql = attr(&versions.graphiql);
    let react = attr(&versions.react);

    out.write_all(PREAMBLE.as_bytes())?;
    writeln!(
        out,
        r#"  <link href="//cdn.jsdelivr.net/npm/graphiql@{graphiql}/graphiql.css" rel="stylesheet" />"#
    )?;
    writeln!(
        out,
        r#"  <script src="//cdn.jsdelivr.net/react/{react}/react.min.js"></script>"#
    )?;
    writeln!(
        out,
        r#"  <script src="//cdn.jsdelivr.net/react/{react}/react-dom.min.js"></script>"#
    )?;
    writeln!(
        out,
        r#"  <script src="//cdn.jsdelivr.net/npm/graphiql@{graphiql}/graphiql.min.js"></script>"#
    )?;
    writeln!(
        out,
        r#"  <script src="//cdn.jsdelivr.net/fetch/{}/fetch.min.js"></script>"#,
        attr(&versions.fetch_polyfill)
    )?;

    let subscriptions_endpoint = match ctx.transport() {
        Transport::WithSubscriptions { url } => {
            writeln!(
                out,
                r#"  <script src="//unpkg.com/subscriptions-transport-ws@{}/browser/client.js"></script>"#,
                attr(&versions.subscriptions_transport)
            )?;
            writeln!(
                out,
                r#"  <script src="//unpkg.com/graphiql-subscriptions-fetcher@{}/browser/client.js"></script>"#,
                attr(&versions.subscriptions_fetcher)
            )?;
            url.encoded()
        }
        Transport::WithoutSubscriptions => "null",
    };

    out.write_all(BODY_OPEN.as_bytes())?;

    // Only pre-encoded literals are interpolated here.
    writeln!(out, "  <script>")?;
    writeln!(out, "    var {} = {{", PAGE_STATE_GLOBAL)?;
    writeln!(out, "      \"endpoint\": {},", ctx.endpoint().encoded())?;
    writeln!(out, "      \"subscriptionsEndpoint\": {subscriptions_endpoint},")?;
    writeln!(out, "      \"query\": {},", ctx.query().encoded())?;
    writeln!(out, "      \"response\": {},", ctx.result().encoded())?;
    writeln!(out, "      \"variables\": {},", ctx.variables().encoded())?;
    writeln!(out, "      \"operationName\": {}", ctx.operation_name().encoded())?;
    writeln!(out, "    }};")?;
    writeln!(out, "  </script>")?;

    out.write_all(BOOTSTRAP_SCRIPT.as_bytes())?;
    out.write_all(DOCUMENT_CLOSE.as_bytes())?;
    out.flush()?;
    Ok(())
}

fn attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
