use axum::response::Html;

/// `GET /docs`: a static, human-readable method reference. Kept as a
/// plain string rather than a templating dependency — the teacher's own
/// `api_server` has no API docs route, so this is grounded on the RPC
/// method table directly rather than imitating an existing file.
pub async fn docs() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
<head><title>aggregator gateway API</title></head>
<body>
<h1>aggregator gateway JSON-RPC API</h1>
<p>JSON-RPC 2.0 over HTTP POST at <code>/</code>.</p>
<table border="1" cellpadding="4">
<tr><th>method</th><th>params</th><th>result</th></tr>
<tr><td>submit_commitment</td><td>requestId, transactionHash, authenticator, receipt?</td><td>status, receipt?</td></tr>
<tr><td>get_inclusion_proof</td><td>requestId</td><td>merkleTreePath, authenticator, transactionHash</td></tr>
<tr><td>get_no_deletion_proof</td><td>(none)</td><td>opaque proof</td></tr>
<tr><td>get_block_height</td><td>(none)</td><td>blockNumber</td></tr>
<tr><td>get_block</td><td>blockNumber | "latest"</td><td>block header</td></tr>
<tr><td>get_block_commitments</td><td>blockNumber</td><td>commitment list</td></tr>
</table>
<p>See <code>GET /health</code> for liveness and leadership status.</p>
</body>
</html>"#,
    )
}
