use deadpool_postgres::Pool;

use crate::error::{AppError, Result};
use crate::sql::Sql;

/// The logical schema. Every statement is guarded with `IF NOT EXISTS`, so
/// creating over an existing schema is a no-op.
const CREATE_SCRIPT: &str = "
-- Relate unique principal ids to display info.
CREATE TABLE IF NOT EXISTS accounts (
  aid               serial      PRIMARY KEY,
  display_name      varchar,
  display_name_html varchar,
  public_url        varchar,
  created           timestamptz DEFAULT now()
);

-- Relate server session nonces to accounts. A row with a NULL aid is a
-- visitor who has a durable identity placeholder but has never logged in.
CREATE TABLE IF NOT EXISTS sessions (
  session_nonce     varchar(32) PRIMARY KEY,
  aid               integer,
  created           timestamptz DEFAULT now()
);

-- Private user info, kept apart from accounts so code paths that never need
-- PII never even select it.
CREATE TABLE IF NOT EXISTS personal_info (
  aid               integer     UNIQUE,
  real_name         varchar,
  email             varchar,
  created           timestamptz DEFAULT now()
);
CREATE INDEX IF NOT EXISTS personal_info_aid ON personal_info ( aid );

-- HTML snippets posted by users. A post is visible if it is public, the
-- viewer wrote it, or the viewer follows its author.
CREATE TABLE IF NOT EXISTS posts (
  pid               serial      PRIMARY KEY,
  author            integer,
  body_html         varchar     NOT NULL,
  public            bool        DEFAULT false,
  created           timestamptz DEFAULT now()
);
CREATE INDEX IF NOT EXISTS posts_author ON posts ( author );
CREATE INDEX IF NOT EXISTS posts_created ON posts ( created DESC );

-- Directed follow edges. An edge (a, b) alone means a follows b; accounts
-- count as mutual friends only when both (a, b) and (b, a) exist. Visibility
-- reads just the outgoing edge; mutuality is a display concept.
CREATE TABLE IF NOT EXISTS friendships (
  fid               serial      PRIMARY KEY,
  left_aid          integer     NOT NULL,
  right_aid         integer     NOT NULL,
  created           timestamptz DEFAULT now()
);
CREATE INDEX IF NOT EXISTS friendships_left_aid ON friendships ( left_aid );
CREATE INDEX IF NOT EXISTS friendships_left_right ON friendships ( left_aid, right_aid );

-- Images attached to a post, in attachment order.
CREATE TABLE IF NOT EXISTS post_resources (
  rid               serial      PRIMARY KEY,
  pid               integer     NOT NULL,
  url_path          varchar     NOT NULL,
  created           timestamptz DEFAULT now()
);
CREATE INDEX IF NOT EXISTS post_resources_pid ON post_resources ( pid );
";

/// Canned accounts, PII, posts, and follow edges for tests and demos. The
/// display names and bodies are deliberately hostile; nothing downstream may
/// rely on stored content being benign. Post timestamps are pinned and spaced
/// so `ORDER BY created` is total.
const FIXTURE_SCRIPT: &str = "
INSERT INTO accounts
  ( aid,  display_name, display_name_html )
VALUES
  ( 2750, 'Abe',        NULL ),
  ( 3055, NULL,         'Bee<script>document.write(\" with an F\")</script>' ),
  ( 3563, NULL,         '<b>D</b>eb' ),
  ( 4014, 'Fae',        '<font color=green>Fae</font>' )
;

INSERT INTO personal_info
  ( aid,  real_name,           email )
VALUES
  ( 2750, 'Abraham Example',   'abe@example.com' ),
  ( 3055, 'Bef F. NULL',       'Bef <script/src=http&#58//@evil.com>' ),
  ( 3563, 'Deborah Testdata',  'debtd@aol.com' ),
  ( 4014, 'Fae O''Postrophey', 'fae@example.com.' )
;

INSERT INTO posts
  ( author, public, body_html, created )
VALUES
  ( 2750, true,  'Hi!  I am <b>Abe</b>', '2018-10-12 12:00:01+00' ),
  ( 3055, true,  '</div></span></table></div>Hi, Abe, <script>alert(\"Nice to meet you!\")</script>!', '2018-10-12 12:00:02+00' ),
  ( 3563, true,  '<h1>Hi, all!</h1>', '2018-10-12 12:00:03+00' ),
  ( 3563, false, 'Bef, I''m browsing via Lynx and your post isn''t Lynx-friendly.', '2018-10-12 12:00:04+00' ),
  ( 4014, true,  'Hi!  This looks like yet another knockoff social site without any users.', '2018-10-12 12:00:05+00' ),
  ( 4014, true,  '(It is probably insecure)', '2018-10-12 12:00:06+00' ),
  ( 3055, false, 'You think?', '2018-10-12 12:00:07+00' )
;

INSERT INTO friendships
  ( left_aid, right_aid )
VALUES
  ( 2750, 2750 ),
  ( 3563, 3055 ),
  ( 3055, 2750 ),
  ( 3055, 3563 ),
  ( 3055, 4014 ),
  ( 2750, 4014 ),
  ( 4014, 2750 )
;
";

fn create_sql() -> Sql {
    Sql::lit(CREATE_SCRIPT)
}

fn fixture_sql() -> Sql {
    Sql::lit(FIXTURE_SCRIPT)
}

/// Derives DROP statements for every table and index the create script
/// declares, so the two can never drift apart.
///
/// Each captured name must be a bare identifier before it is allowed to
/// become syntax; Postgres folds unquoted created names to lower case, so the
/// quoted drops fold too.
fn drop_sql() -> Result<Sql> {
    let mut script: Option<Sql> = None;
    for line in CREATE_SCRIPT.lines() {
        let line = line.trim_start();
        let (is_table, rest) = if let Some(rest) = line.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
            (true, rest)
        } else if let Some(rest) = line.strip_prefix("CREATE INDEX IF NOT EXISTS ") {
            (false, rest)
        } else {
            continue;
        };

        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_ascii_lowercase();

        let stmt = if is_table {
            Sql::lit("DROP TABLE IF EXISTS \"")
                .append(Sql::ident(&name)?)
                .push("\"")
        } else {
            Sql::lit("DROP INDEX IF EXISTS \"")
                .append(Sql::ident(&name)?)
                .push("\"")
        };
        script = Some(match script {
            Some(s) => s.push(";\n").append(stmt),
            None => stmt,
        });
    }
    script.ok_or_else(|| AppError::Internal("create script declares nothing to drop".to_string()))
}

/// Creates the schema. Idempotent.
pub async fn create_schema(db: &Pool) -> Result<()> {
    let client = db.get().await?;
    create_sql().batch(&client).await
}

/// Drops everything the create script declares, then recreates it empty.
/// Idempotent; independent of whatever state came before.
pub async fn reset_schema(db: &Pool) -> Result<()> {
    let client = db.get().await?;
    drop_sql()?
        .push(";\n")
        .append(create_sql())
        .batch(&client)
        .await
}

/// Resets the schema and loads the canned fixture data.
pub async fn reset_schema_with_fixture_data(db: &Pool) -> Result<()> {
    let client = db.get().await?;
    drop_sql()?
        .push(";\n")
        .append(create_sql())
        .push(";\n")
        .append(fixture_sql())
        .batch(&client)
        .await
}
