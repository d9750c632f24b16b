use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncWriteExt;

use gcsblob_core::{BucketSettings, GcsBlobConfig, GuessMimeResolver, ObjectStoreClient, UrlSigner};
use gcsblob_events::{ContentEvent, ContentEventKind, EventDispatcher, publisher_from_settings};
use gcsblob_gcs::{GcsClient, V4Signer, token_source_from_settings};
use gcsblob_provider::BlobProvider;
use gcsblob_store_fs::FsObjectStore;

use crate::cli::{Cli, Command};

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = GcsBlobConfig::load(&cli.config.to_string_lossy())
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::Event {
            kind,
            content_link,
            content_id,
        } => publish_event(&config, &kind, &content_link, content_id).await,
        command => {
            let provider = build_provider(&config.bucket)?;
            run_blob_command(&provider, command).await
        }
    }
}

async fn run_blob_command(provider: &BlobProvider, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Init => {
            let created = provider.create_if_not_exist().await?;
            if created {
                println!("created bucket {}", provider.bucket_name());
            } else {
                println!("bucket {} already exists", provider.bucket_name());
            }
        }
        Command::Put {
            uri,
            file,
            content_type,
        } => {
            let mut blob = provider.get_blob(&uri)?;
            if let Some(ct) = content_type {
                blob.set_content_type(ct);
            }
            let mut source = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("opening {}", file.display()))?;
            let mut writer = blob.open_write();
            let copied = tokio::io::copy(&mut source, &mut writer).await?;
            writer.close().await?;
            println!("uploaded {copied} bytes to {}", blob.object_name());
        }
        Command::Get { uri, out } => {
            let data = provider.get_blob(&uri)?.read_bytes().await?;
            match out {
                Some(path) => tokio::fs::write(&path, &data)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?,
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
            }
        }
        Command::Delete { uri } => {
            provider.delete(&uri).await?;
            println!("deleted {uri}");
        }
        Command::Info { uri } => {
            let info = provider.get_blob(&uri)?.as_file_info(None).await?;
            println!("name:          {}", info.name);
            println!("length:        {}", info.length);
            println!("last modified: {}", info.last_modified.to_rfc3339());
            println!("exists:        {}", info.exists);
            println!("directory:     {}", info.is_directory);
        }
        Command::Sign {
            uri,
            method,
            content_type,
        } => {
            let mut blob = provider.get_blob(&uri)?;
            if let Some(ct) = content_type {
                blob.set_content_type(ct);
            }
            println!("{}", blob.signed_url(method.into())?);
        }
        Command::Event { .. } => anyhow::bail!("event is not a blob command"),
    }
    Ok(())
}

/// Client first, then the signer, then the provider over both.
fn build_provider(settings: &BucketSettings) -> anyhow::Result<BlobProvider> {
    let local_root = settings
        .endpoint
        .as_deref()
        .and_then(|e| e.strip_prefix("file://"));

    let client: Arc<dyn ObjectStoreClient> = match local_root {
        Some(root) => {
            tracing::info!(root, "using local object store");
            Arc::new(FsObjectStore::new(root)?)
        }
        None => Arc::new(GcsClient::from_settings(settings)?),
    };

    let signer: Option<Arc<dyn UrlSigner>> = match &settings.service_account_key_path {
        Some(path) => {
            let mut signer = V4Signer::from_key_file(path)?;
            if let Some(endpoint) = settings.endpoint.as_deref().filter(|_| local_root.is_none()) {
                signer = signer.with_endpoint(endpoint);
            }
            Some(Arc::new(signer) as Arc<dyn UrlSigner>)
        }
        None => None,
    };

    Ok(BlobProvider::new(
        settings.clone(),
        client,
        signer,
        Arc::new(GuessMimeResolver),
    )?)
}

async fn publish_event(
    config: &GcsBlobConfig,
    kind: &str,
    content_link: &str,
    content_id: Option<i64>,
) -> anyhow::Result<()> {
    let kind: ContentEventKind = kind.parse()?;
    let tokens = token_source_from_settings(&config.bucket)?;
    let publisher = publisher_from_settings(&config.events, tokens);
    let (dispatcher, worker) = EventDispatcher::new(&config.events, publisher)?;
    let handle = tokio::spawn(worker.run());

    let event = ContentEvent {
        content_link: Some(content_link.to_string()),
        content_id,
        content: None,
    };
    if !dispatcher.notify(kind, &event) {
        tracing::warn!(%kind, "event not queued; kind disabled or queue unavailable");
    }
    drop(dispatcher);
    handle.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn local_settings(root: &std::path::Path) -> BucketSettings {
        let mut settings = BucketSettings::new("media");
        settings.endpoint = Some(format!("file://{}", root.display()));
        settings
    }

    #[tokio::test]
    async fn local_endpoint_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let provider = build_provider(&local_settings(dir.path())).unwrap();
        assert!(provider.create_if_not_exist().await.unwrap());

        let blob = provider.get_blob("https://cms.local/media/notes.txt").unwrap();
        blob.write(Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(&blob.read_bytes().await.unwrap()[..], b"hello");
        assert!(dir.path().join("media/media/notes.txt").exists());
    }

    #[test]
    fn signed_mode_without_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = local_settings(dir.path());
        settings.use_signed_urls = true;
        assert!(build_provider(&settings).is_err());
    }
}
