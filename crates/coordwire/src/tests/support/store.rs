//! In-memory revisioned store answering requests the way the real server does.

use std::collections::BTreeMap;

use coordwire_proto::{CLOBBER, ErrCode, FLAG_DEL, FLAG_SET, MISSING, Request, Response, Verb};

/// One committed mutation.
#[derive(Debug, Clone)]
struct Change {
    rev: i64,
    path: String,
    body: Option<Vec<u8>>,
}

impl Change {
    fn event(&self, tag: Option<i32>) -> Response {
        Response {
            tag,
            rev: Some(self.rev),
            path: Some(self.path.clone()),
            value: self.body.clone(),
            flags: Some(if self.body.is_some() { FLAG_SET } else { FLAG_DEL }),
            ..Response::default()
        }
    }
}

/// A `WAIT` with nothing to report yet.
#[derive(Debug)]
struct Parked {
    tag: Option<i32>,
    glob: String,
    from: i64,
}

impl Parked {
    fn fires_on(&self, change: &Change) -> bool {
        change.rev >= self.from && glob_matches(self.glob.as_bytes(), change.path.as_bytes())
    }
}

#[derive(Debug)]
pub(crate) struct Store {
    rev: i64,
    files: BTreeMap<String, (i64, Vec<u8>)>,
    history: Vec<Change>,
    parked: Vec<Parked>,
    self_id: Vec<u8>,
}

impl Store {
    pub(crate) fn new(self_id: &[u8]) -> Self {
        Self {
            rev: 0,
            files: BTreeMap::new(),
            history: Vec::new(),
            parked: Vec::new(),
            self_id: self_id.to_vec(),
        }
    }

    /// Writes `body` to `path` unconditionally, as seed data.
    pub(crate) fn seed(&mut self, path: &str, body: &[u8]) {
        let request = Request::set(path, CLOBBER, body);
        drop(self.apply(request));
    }

    /// Applies one request, returning its reply plus any events it released.
    pub(crate) fn apply(&mut self, request: Request) -> Vec<Response> {
        let tag = request.tag;
        match request.verb.and_then(|verb| Verb::try_from(verb).ok()) {
            Some(Verb::Rev) => vec![Response {
                tag,
                rev: Some(self.rev),
                ..Response::default()
            }],
            Some(Verb::SelfId) => vec![Response {
                tag,
                value: Some(self.self_id.clone()),
                ..Response::default()
            }],
            Some(Verb::Get) => vec![self.get(tag, &request)],
            Some(Verb::Set) => self.set(tag, request),
            Some(Verb::Del) => self.del(tag, &request),
            Some(Verb::Wait) => self.wait(tag, request).into_iter().collect(),
            _ => vec![failure(tag, ErrCode::UnknownVerb, "")],
        }
    }

    fn get(&self, tag: Option<i32>, request: &Request) -> Response {
        let path = request.path();
        let at = request.rev();
        if at > self.rev {
            return failure(tag, ErrCode::Range, path);
        }
        let found = if at == 0 {
            self.files.get(path).cloned()
        } else {
            self.history
                .iter()
                .rev()
                .find(|change| change.rev <= at && change.path == path)
                .and_then(|change| change.body.clone().map(|body| (change.rev, body)))
        };
        let Some((rev, body)) = found else {
            return failure(tag, ErrCode::NoEnt, path);
        };
        Response {
            tag,
            rev: Some(rev),
            value: Some(body),
            ..Response::default()
        }
    }

    fn set(&mut self, tag: Option<i32>, request: Request) -> Vec<Response> {
        let path = request.path().to_owned();
        let old_rev = request.rev();
        let current = self.files.get(&path).map_or(MISSING, |(rev, _)| *rev);
        if old_rev != CLOBBER && old_rev != current {
            return vec![failure(tag, ErrCode::RevMismatch, &path)];
        }
        let body = request.value.unwrap_or_default();
        self.rev += 1;
        self.files.insert(path.clone(), (self.rev, body.clone()));
        let reply = Response {
            tag,
            rev: Some(self.rev),
            ..Response::default()
        };
        self.commit(reply, Change {
            rev: self.rev,
            path,
            body: Some(body),
        })
    }

    fn del(&mut self, tag: Option<i32>, request: &Request) -> Vec<Response> {
        let path = request.path().to_owned();
        let Some((current, _)) = self.files.get(&path) else {
            return vec![failure(tag, ErrCode::NoEnt, &path)];
        };
        let rev = request.rev();
        if rev != CLOBBER && rev != *current {
            return vec![failure(tag, ErrCode::RevMismatch, &path)];
        }
        self.files.remove(&path);
        self.rev += 1;
        let reply = Response {
            tag,
            ..Response::default()
        };
        self.commit(reply, Change {
            rev: self.rev,
            path,
            body: None,
        })
    }

    fn wait(&mut self, tag: Option<i32>, request: Request) -> Option<Response> {
        let parked = Parked {
            tag,
            glob: request.path.unwrap_or_default(),
            from: request.rev.unwrap_or_default(),
        };
        match self.history.iter().find(|change| parked.fires_on(change)) {
            Some(change) => Some(change.event(tag)),
            None => {
                self.parked.push(parked);
                None
            }
        }
    }

    fn commit(&mut self, reply: Response, change: Change) -> Vec<Response> {
        let (ready, waiting): (Vec<Parked>, Vec<Parked>) = std::mem::take(&mut self.parked)
            .into_iter()
            .partition(|parked| parked.fires_on(&change));
        self.parked = waiting;
        let mut responses = vec![reply];
        responses.extend(ready.iter().map(|parked| change.event(parked.tag)));
        self.history.push(change);
        responses
    }
}

fn failure(tag: Option<i32>, code: ErrCode, detail: &str) -> Response {
    Response {
        tag,
        err_code: Some(code.into()),
        err_detail: (!detail.is_empty()).then(|| detail.to_owned()),
        ..Response::default()
    }
}

/// Matches `path` against `pattern`: `?` is one character other than `/`,
/// `*` a run of characters other than `/`, `**` any run at all.
pub(crate) fn glob_matches(pattern: &[u8], path: &[u8]) -> bool {
    match pattern {
        [] => path.is_empty(),
        [b'*', b'*', rest @ ..] => {
            (0..=path.len()).any(|at| path.get(at..).is_some_and(|tail| glob_matches(rest, tail)))
        }
        [b'*', rest @ ..] => {
            let limit = path.iter().position(|byte| *byte == b'/').unwrap_or(path.len());
            (0..=limit).any(|at| path.get(at..).is_some_and(|tail| glob_matches(rest, tail)))
        }
        [b'?', rest @ ..] => {
            matches!(path, [first, tail @ ..] if *first != b'/' && glob_matches(rest, tail))
        }
        [expected, rest @ ..] => {
            matches!(path, [first, tail @ ..] if first == expected && glob_matches(rest, tail))
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("/a/*", "/a/b", true)]
    #[case("/a/*", "/a/b/c", false)]
    #[case("/a/**", "/a/b/c", true)]
    #[case("/**", "/x", true)]
    #[case("/a/?", "/a/b", true)]
    #[case("/a/?", "/a/bc", false)]
    #[case("/a/b", "/a/b", true)]
    #[case("/a/b", "/a/c", false)]
    fn globs(#[case] pattern: &str, #[case] path: &str, #[case] expected: bool) {
        assert_eq!(glob_matches(pattern.as_bytes(), path.as_bytes()), expected);
    }

    #[rstest]
    fn parked_waits_fire_on_matching_writes() {
        let mut store = Store::new(b"node");
        let mut wait = Request::wait("/dir/*", 1);
        wait.tag = Some(9);
        assert!(store.apply(wait).is_empty());

        let mut set = Request::set("/dir/f", MISSING, b"x".to_vec());
        set.tag = Some(1);
        let responses = store.apply(set);

        let tags: Vec<Option<i32>> = responses.iter().map(|response| response.tag).collect();
        assert_eq!(tags, [Some(1), Some(9)]);
    }

    #[rstest]
    fn reads_of_deleted_files_report_no_entry() {
        let mut store = Store::new(b"node");
        store.seed("/gone", b"x");
        let removed = store.apply(Request::del("/gone", CLOBBER));
        assert_eq!(removed.len(), 1);

        let responses = store.apply(Request::get("/gone", 0));

        let codes: Vec<Option<i32>> = responses.iter().map(|response| response.err_code).collect();
        assert_eq!(codes, [Some(ErrCode::NoEnt.into())]);
    }
}
