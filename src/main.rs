use std::sync::Arc;

use metrics::counter;
use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        accounts::{self, AccountService},
        error::AppError,
        comments::CommentService,
        feed::{FeedPagination, FeedService},
        follows::FollowService,
        groups::GroupService,
        posts::PostService,
        repos::{
            CommentsRepo, CreateUserParams, FollowsRepo, GroupsRepo, PostsRepo, SessionsRepo,
            UsersRepo,
        },
    },
    cache::{CacheConfig, CacheState},
    config,
    domain::slug::is_valid_username,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::UploadStorage,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        std::process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::CreateUser(args) => run_create_user(settings, args).await,
        config::Command::CreateGroup(args) => run_create_group(settings, args).await,
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();

    let pagination = FeedPagination {
        per_page: settings.pagination.per_page.get(),
        delta: settings.pagination.delta,
    };

    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        users_repo.clone(),
        groups_repo.clone(),
        comments_repo.clone(),
        follows_repo.clone(),
        pagination,
    ));
    let posts = Arc::new(PostService::new(posts_repo.clone(), groups_repo.clone()));
    let comments = Arc::new(CommentService::new(posts_repo, comments_repo));
    let follows = Arc::new(FollowService::new(users_repo.clone(), follows_repo));
    let accounts = Arc::new(AccountService::new(
        users_repo,
        sessions_repo,
        time::Duration::try_from(settings.sessions.ttl)
            .map_err(|err| AppError::unexpected(format!("invalid session ttl: {err}")))?,
    ));
    let groups = Arc::new(GroupService::new(groups_repo));

    let uploads = Arc::new(
        UploadStorage::new(
            settings.uploads.directory.clone(),
            settings.uploads.max_request_bytes.get(),
        )
        .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let cache = settings
        .cache
        .enabled
        .then(|| CacheState::new(CacheConfig::from(&settings.cache)));

    Ok(HttpState {
        feed,
        posts,
        comments,
        follows,
        accounts,
        groups,
        uploads,
        upload_limit_bytes: usize::try_from(settings.uploads.max_request_bytes.get())
            .unwrap_or(usize::MAX),
        cache,
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let state = build_http_state(repositories, &settings)?;

    // Expired sessions are rejected at resolve time; the sweeper only keeps
    // the table from growing without bound.
    let sweeper = {
        let accounts = state.accounts.clone();
        let interval = settings.sessions.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip the first immediate tick
            loop {
                ticker.tick().await;
                match accounts.sweep_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => {
                        counter!("yatube_sessions_swept_total").increment(removed);
                        info!(
                            target = "yatube::sessions",
                            removed, "swept expired sessions"
                        );
                    }
                    Err(err) => {
                        error!(
                            target = "yatube::sessions",
                            error = %err,
                            "session sweep failed"
                        );
                    }
                }
            }
        })
    };

    let router = http::build_router(state);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "yatube::server",
        addr = %settings.server.addr,
        "serving"
    );

    let result = axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    sweeper.abort();
    let _ = sweeper.await;

    result
}

async fn run_create_user(
    settings: config::Settings,
    args: config::CreateUserArgs,
) -> Result<(), AppError> {
    if !is_valid_username(args.username.trim()) {
        return Err(AppError::validation(
            "usernames may only contain letters, digits, `-`, `_` and `.`",
        ));
    }
    if args.password.len() < 8 {
        return Err(AppError::validation(
            "passwords must be at least 8 characters long",
        ));
    }

    let repositories = init_repositories(&settings).await?;
    let users_repo: Arc<dyn UsersRepo> = repositories;

    let password_hash = accounts::hash_password_for_cli(&args.password)
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    let user = users_repo
        .create_user(CreateUserParams {
            username: args.username.trim().to_string(),
            password_hash,
            display_name: args
                .display_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        })
        .await?;

    info!(
        target = "yatube::cli",
        username = %user.username,
        "created user"
    );
    Ok(())
}

async fn run_create_group(
    settings: config::Settings,
    args: config::CreateGroupArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let groups_repo: Arc<dyn GroupsRepo> = repositories;
    let groups = GroupService::new(groups_repo);

    let group = groups
        .create_group(&args.title, args.description.as_deref())
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    info!(
        target = "yatube::cli",
        title = %group.title,
        slug = %group.slug,
        "created group"
    );
    Ok(())
}
