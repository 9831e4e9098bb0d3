mod block;
mod tls;


use crate::conf::{Options, StatsOptions};
use crate::mapping::{BuildOutput, HostDef, ListenDef};
use crate::paths::Paths;
use block::Block;

/// Loopback port the ACME client listens on for HTTP-01 challenges.
pub const CERTBOT_CHALLENGE_PORT: u16 = 2080;

const ERROR_PAGES_DIR: &str = "/etc/haproxy/errors-custom";
const ERROR_CODES: [u16; 10] = [400, 403, 404, 405, 408, 429, 500, 502, 503, 504];

/// Header directives every HTTP host backend carries, in order.
const FORWARD_HEADERS: [&str; 4] = [
    "http-request set-header X-Forwarded-Port %[dst_port]",
    "http-request add-header X-Forwarded-Proto https if { ssl_fc }",
    "http-request set-header X-Forwarded-Host %[req.hdr(Host)]",
    "http-request set-header X-Request-ID %[uuid()]",
];

/// Renders the proxy configuration file from a build output.
///
/// The output depends only on its inputs: listens are ordered by port, hosts
/// and redirects by name, backends by address.
pub struct ConfigRenderer<'a> {
    options: &'a Options,
    paths: &'a Paths,
}

impl<'a> ConfigRenderer<'a> {
    pub fn new(options: &'a Options, paths: &'a Paths) -> Self {
        Self { options, paths }
    }

    pub fn render(&self, build: &BuildOutput) -> String {
        let mut sections = vec![
            self.global(&build.fragments.global),
            self.defaults(&build.fragments.defaults),
            self.dashboard_frontend().render(),
            self.dashboard_backend().render(),
        ];

        if let Some(stats) = &self.options.stats {
            sections.push(stats_frontend(stats).render());
            sections.push(stats_backend(stats).render());
        }

        sections.push(certbot_backend().render());

        for listen in build.routes.iter() {
            if listen.hosts.is_empty() && listen.redirect.is_empty() {
                continue;
            }

            sections.push(self.listen_frontend(listen).render());
            for (hostname, host) in &listen.hosts {
                sections.push(host_backend(listen, hostname, host).render());
            }
            for (from, to) in &listen.redirect {
                sections.push(redirect_backend(listen.port, from, to).render());
            }
        }

        sections.join("\n")
    }

    fn global(&self, snippets: &[String]) -> String {
        let mut global = Block::new("global");
        global
            .line("log stdout format raw local0 info")
            .line("maxconn 2000")
            .line("tune.ssl.default-dh-param 2048");
        for directive in tls::bind_directives(self.options.ssl_mode) {
            global.line(directive);
        }

        // Global snippets may open their own sections (`fcgi-app ...`), so
        // they are emitted as written.
        let mut out = global.render();
        for snippet in snippets {
            out.push('\n');
            out.push_str(snippet.trim_end());
            out.push('\n');
        }
        out
    }

    fn defaults(&self, snippets: &[String]) -> String {
        let mut defaults = Block::new("defaults");
        defaults
            .line("log global")
            .line("mode http")
            .line("option httplog")
            .line("option dontlognull")
            .line("timeout connect 5s")
            .line("timeout client 50s")
            .line("timeout server 50s")
            .line(r"unique-id-format %{+X}o\ %ci:%cp_%fi:%fp_%Ts_%rt:%pid")
            .line("unique-id-header X-Request-ID");

        if self.options.custom_errors {
            for code in ERROR_CODES {
                defaults.line(format!("errorfile {code} {ERROR_PAGES_DIR}/{code}.http"));
            }
        }

        for snippet in snippets {
            defaults.snippet(snippet);
        }
        defaults.render()
    }

    fn dashboard_frontend(&self) -> Block {
        let port = self.options.dashboard_port;
        let mut frontend = Block::new("frontend dashboard_in");
        frontend
            .line(format!("bind 127.0.0.1:{}", port.checked_add(1).unwrap_or(port)))
            .line("mode http")
            .line("default_backend dashboard_backend");
        frontend
    }

    fn dashboard_backend(&self) -> Block {
        let mut backend = Block::new("backend dashboard_backend");
        backend
            .line("mode http")
            .line(format!("server dashboard 127.0.0.1:{}", self.options.dashboard_port));
        backend
    }

    fn listen_frontend(&self, listen: &ListenDef) -> Block {
        let port = listen.port;
        let tcp = listen.mode == "tcp";
        let name = if tcp { "tcp_in" } else { "http_in" };

        let mut frontend = Block::new(format!("frontend {name}_{port}"));
        if listen.ssl {
            frontend.line(format!(
                "bind *:{port} ssl crt {}/",
                self.paths.certs_haproxy.display()
            ));
        } else {
            frontend.line(format!("bind *:{port}"));
        }
        frontend.line(format!("mode {}", listen.mode));

        if tcp {
            if let Some(first) = listen.hosts.keys().next() {
                frontend.line(format!("default_backend {}", scoped("srv", first, port)));
            }
            return frontend;
        }

        // ACME challenges are dispatched before any other rule.
        for (hostname, _) in listen.hosts.iter().filter(|(_, h)| h.certbot) {
            let acl = scoped("is_certbot", hostname, port);
            frontend
                .line(format!("acl {acl} path_beg /.well-known/acme-challenge/"))
                .line(format!("use_backend certbot_backend if {acl}"));
        }

        for (hostname, host) in &listen.hosts {
            let acl = scoped("is_rule", hostname, port);
            frontend.line(format!("acl {acl} hdr_dom(host) -i {hostname}"));

            if host.redirect_ssl {
                let mut condition = format!("{acl} !{{ ssl_fc }}");
                if host.certbot {
                    condition.push_str(&format!(" !{}", scoped("is_certbot", hostname, port)));
                }
                frontend.line(format!("http-request redirect scheme https code 301 if {condition}"));
            }
        }

        for from in listen.redirect.keys() {
            let acl = scoped("is_redirect", from, port);
            frontend
                .line(format!("acl {acl} hdr_dom(host) -i {from}"))
                .line(format!("use_backend {} if {acl}", scoped("redirect", from, port)));
        }

        for hostname in listen.hosts.keys() {
            frontend.line(format!(
                "use_backend {} if {}",
                scoped("srv", hostname, port),
                scoped("is_rule", hostname, port)
            ));
        }

        frontend
    }
}

fn stats_frontend(stats: &StatsOptions) -> Block {
    let mut frontend = Block::new("frontend stats");
    frontend
        .line(format!("bind *:{}", stats.port))
        .line("mode http");

    let origin = stats.cors_origin.trim();
    if !origin.is_empty() {
        frontend
            .line(format!("acl from_ui hdr(Origin) -i {origin}"))
            .line("acl preflight method OPTIONS")
            .line(format!(
                "http-request return status 204 hdr Access-Control-Allow-Origin \"{origin}\" \
                 hdr Access-Control-Allow-Methods \"GET, OPTIONS\" \
                 hdr Access-Control-Allow-Headers \"Authorization, Content-Type\" if from_ui preflight"
            ))
            .line(format!(
                "http-after-response set-header Access-Control-Allow-Origin \"{origin}\" if from_ui"
            ))
            .line("http-after-response set-header Access-Control-Expose-Headers \"X-Request-ID\" if from_ui")
            .line("http-after-response set-header Vary \"Origin\"");
    }

    frontend
        .line("acl is_dashboard path_beg /dashboard")
        .line(r"http-request replace-path ^/dashboard/?(.*) /\1 if is_dashboard")
        .line("use_backend dashboard_backend if is_dashboard")
        .line("default_backend stats_backend");
    frontend
}

fn stats_backend(stats: &StatsOptions) -> Block {
    let mut backend = Block::new("backend stats_backend");
    backend
        .line("mode http")
        .line("stats enable")
        .line("stats hide-version")
        .line(r"stats realm Haproxy\ Statistics")
        .line("stats uri /")
        .line(format!("stats auth {}:{}", stats.username, stats.password));
    backend
}

fn certbot_backend() -> Block {
    let mut backend = Block::new("backend certbot_backend");
    backend
        .line("mode http")
        .line(format!("server certbot 127.0.0.1:{CERTBOT_CHALLENGE_PORT}"));
    backend
}

fn host_backend(listen: &ListenDef, hostname: &str, host: &HostDef) -> Block {
    let mut backend = Block::new(format!("backend {}", scoped("srv", hostname, listen.port)));
    backend
        .line(format!("mode {}", listen.mode))
        .line(format!("balance {}", host.balance));

    if listen.mode != "tcp" {
        backend.line("option forwardfor");
        for header in FORWARD_HEADERS {
            backend.line(header);
        }
    }

    for fragment in &host.plugin_fragments {
        backend.snippet(fragment);
    }

    for (index, address) in host.backends.iter().enumerate() {
        let mut server = format!("server srv-{} {address} check", index + 1);
        // TLS ends at a listen with `ssl`; its backends are reached in clear.
        if listen.ssl_check == "ssl" && !listen.ssl {
            server.push_str(" ssl verify none");
        }
        if !host.proto.is_empty() {
            server.push_str(&format!(" proto {}", host.proto));
        }
        backend.line(server);
    }

    backend
}

fn redirect_backend(port: u16, from: &str, to: &str) -> Block {
    let mut backend = Block::new(format!("backend {}", scoped("redirect", from, port)));
    backend
        .line("mode http")
        .line(format!("redirect location {to} code 302"));
    backend
}

/// Section-name form of a hostname.
pub fn munge(hostname: &str) -> String {
    hostname.replace('.', "_")
}

/// `<kind>_<munged host>_<port>`, used for both ACL and backend names.
fn scoped(kind: &str, hostname: &str, port: u16) -> String {
    format!("{kind}_{}_{port}", munge(hostname))
}
