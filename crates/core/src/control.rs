//! Request dispatch for the control process.
//!
//! [`ControlContext`] owns every piece of process-wide state and answers one
//! request at a time. [`SharedControl`] puts it behind an async mutex for the
//! daemon and runs extension installs without holding that mutex while the
//! package is downloaded and unpacked.

use std::path::PathBuf;
use std::sync::Arc;

use blynx_protocol::{
	BroadcastEvent, ControlRequest, ControlResponse, ExtensionSource, HistoryEntry, InstallOutcome,
	InstalledExtension,
};
use tracing::{debug, info, warn};

use crate::browsing::BrowsingData;
use crate::clock::IdClock;
use crate::error::{Error, Result};
use crate::ext_storage::ExtensionStorage;
use crate::extensions::{EXTENSIONS_DIR, ExtensionInstaller, ExtensionRegistry, InstallPlan};
use crate::host::ShellHost;
use crate::migrate;
use crate::notifier::{ChangeNotifier, Subscription};
use crate::profiles::ProfileRegistry;
use crate::session::SessionPartitions;
use crate::settings::Settings;
use crate::store::StoreRegistry;
use crate::store::registry::DEFAULT_PROFILE;
use crate::tab_transfer::TabTransferBroker;

/// Locations the control process works with.
#[derive(Debug, Clone)]
pub struct ControlOptions {
	/// Root of every store and unpacked extension.
	pub user_data_dir: PathBuf,
	/// Application directory; internal pages live in `<app_dir>/internal`.
	pub app_dir: PathBuf,
}

pub struct ControlContext {
	stores: Arc<StoreRegistry>,
	profiles: ProfileRegistry,
	tabs: TabTransferBroker,
	sessions: SessionPartitions,
	notifier: ChangeNotifier,
	host: Arc<dyn ShellHost>,
	ids: IdClock,
}

impl ControlContext {
	/// Opens the stores under `options.user_data_dir`, upgrades legacy layouts
	/// and activates the current profile.
	pub fn open(options: &ControlOptions, notifier: ChangeNotifier, host: Arc<dyn ShellHost>) -> Result<Self> {
		let stores = Arc::new(StoreRegistry::new(&options.user_data_dir));
		migrate::run(&stores)?;
		let mut ctx = Self {
			profiles: ProfileRegistry::new(Arc::clone(&stores)),
			stores,
			tabs: TabTransferBroker::new(),
			sessions: SessionPartitions::new(&options.app_dir),
			notifier,
			host,
			ids: IdClock::new(),
		};
		let current = ctx.profiles.current_id()?;
		if let Err(err) = ctx.activate(&current) {
			warn!(target = "blynx.profiles", id = %current, error = %err, "failed to activate current profile");
		}
		info!(target = "blynx.daemon", user_data = %options.user_data_dir.display(), profile = %current, "control state ready");
		Ok(ctx)
	}

	pub fn stores(&self) -> &Arc<StoreRegistry> {
		&self.stores
	}

	pub fn notifier(&self) -> &ChangeNotifier {
		&self.notifier
	}

	/// Answers `request`. Failures become error responses; nothing here
	/// brings the process down.
	pub fn handle(&mut self, request: ControlRequest) -> ControlResponse {
		let name = request.name();
		debug!(target = "blynx.daemon", request = name, "handling request");
		match self.dispatch(request) {
			Ok(response) => response,
			Err(err) => {
				warn!(target = "blynx.daemon", request = name, error = %err, "request failed");
				ControlResponse::error(err.code(), err.to_string())
			}
		}
	}

	fn dispatch(&mut self, request: ControlRequest) -> Result<ControlResponse> {
		use ControlRequest as R;

		Ok(match request {
			R::Ping => ControlResponse::ok("pong"),
			R::Shutdown => ControlResponse::unit(),

			R::StoreGet { key, default } => ControlResponse::ok(self.stores.global_store()?.get(&key, default)),
			R::StoreSet { key, value } => {
				self.stores.global_store()?.set(&key, value)?;
				ControlResponse::unit()
			}
			R::StoreDelete { key } => {
				self.stores.global_store()?.delete(&key)?;
				ControlResponse::unit()
			}

			R::ProfileStoreGet { key, default } => ControlResponse::ok(self.profiles.current_store()?.get(&key, default)),
			R::ProfileStoreSet { key, value } => {
				self.profiles.current_store()?.set(&key, value)?;
				ControlResponse::unit()
			}
			R::ProfileStoreDelete { key } => {
				self.profiles.current_store()?.delete(&key)?;
				ControlResponse::unit()
			}

			R::ExtStorageGet {
				extension_id,
				area_name,
				keys,
			} => {
				let profile = self.profiles.current_id()?;
				let storage = ExtensionStorage::new(&self.stores, &self.notifier, &profile);
				ControlResponse::ok(storage.get(extension_id.as_deref(), area_name, keys)?)
			}
			R::ExtStorageSet {
				extension_id,
				area_name,
				items,
			} => {
				let profile = self.profiles.current_id()?;
				let storage = ExtensionStorage::new(&self.stores, &self.notifier, &profile);
				ControlResponse::ok(storage.set(extension_id.as_deref(), area_name, items)?)
			}
			R::ExtStorageRemove {
				extension_id,
				area_name,
				keys,
			} => {
				let profile = self.profiles.current_id()?;
				let storage = ExtensionStorage::new(&self.stores, &self.notifier, &profile);
				ControlResponse::ok(storage.remove(extension_id.as_deref(), area_name, keys.into_vec())?)
			}
			R::ExtStorageClear {
				extension_id,
				area_name,
			} => {
				let profile = self.profiles.current_id()?;
				let storage = ExtensionStorage::new(&self.stores, &self.notifier, &profile);
				ControlResponse::ok(storage.clear(extension_id.as_deref(), area_name)?)
			}

			R::ProfilesList => ControlResponse::ok(self.profiles.list()?),
			R::ProfilesCurrent => ControlResponse::ok(self.profiles.current()?),
			R::ProfilesCreate { name } => ControlResponse::ok(self.profiles.create(name.as_deref())?),
			R::ProfilesSwitch { profile_id } => ControlResponse::ok(self.switch_profile(&profile_id)?),
			R::ProfilesRemove { profile_id } => ControlResponse::ok(self.remove_profile(&profile_id)?),
			R::EnsureProfileSession { profile_id } => {
				ControlResponse::ok(self.sessions.ensure(self.host.as_ref(), &profile_id)?)
			}

			R::TabDragStart { payload } => {
				self.tabs.start(payload);
				ControlResponse::unit()
			}
			R::TabDragClaim => ControlResponse::ok(self.tabs.claim()),
			R::TabDragWasClaimed => ControlResponse::ok(self.tabs.was_claimed()),
			R::CreateWindowWithTab { payload } => {
				let Some(url) = payload.map(|p| p.url).filter(|url| !url.is_empty()) else {
					return Ok(ControlResponse::ok(false));
				};
				self.host.open_window(&url)?;
				info!(target = "blynx.tabs", url = %url, "tab torn off into a new window");
				ControlResponse::ok(true)
			}

			R::GetBookmarks => {
				let store = self.profiles.current_store()?;
				ControlResponse::ok(BrowsingData::new(&store, &self.ids).bookmarks())
			}
			R::AddBookmark { bookmark } => {
				let store = self.profiles.current_store()?;
				ControlResponse::ok(BrowsingData::new(&store, &self.ids).add_bookmark(bookmark)?)
			}
			R::RemoveBookmark { id } => {
				let store = self.profiles.current_store()?;
				ControlResponse::ok(BrowsingData::new(&store, &self.ids).remove_bookmark(id)?)
			}
			R::GetHistory => {
				let store = self.profiles.current_store()?;
				ControlResponse::ok(BrowsingData::new(&store, &self.ids).history())
			}
			R::SetHistory { history } => {
				let store = self.profiles.current_store()?;
				ControlResponse::ok(BrowsingData::new(&store, &self.ids).set_history(history)?)
			}
			R::AddHistory { item } => {
				let store = self.profiles.current_store()?;
				ControlResponse::ok(BrowsingData::new(&store, &self.ids).add_history(item)?)
			}
			R::ClearHistory => {
				let profile_id = self.profiles.current_id()?;
				let store = self.stores.profile_store(&profile_id)?;
				BrowsingData::new(&store, &self.ids).clear_history()?;
				self.notifier.publish(BroadcastEvent::HistoryCleared { profile_id });
				ControlResponse::ok(Vec::<HistoryEntry>::new())
			}

			R::GetSearchEngine => {
				let global = self.stores.global_store()?;
				ControlResponse::ok(Settings::new(&global).search_engine())
			}
			R::GetSearchUrl { query } => {
				let global = self.stores.global_store()?;
				ControlResponse::ok(Settings::new(&global).search_url(&query))
			}
			R::GetInternalPageUrl { page } => ControlResponse::ok(self.sessions.internal_page_url(&page)?),
			R::ResolveInternalUrl { url } => ControlResponse::ok(self.sessions.resolve_internal(&url)?),
			R::WindowStateGet => {
				let global = self.stores.global_store()?;
				ControlResponse::ok(Settings::new(&global).window_state())
			}
			R::WindowStateSave { bounds } => {
				let global = self.stores.global_store()?;
				Settings::new(&global).save_window_state(bounds)?;
				ControlResponse::unit()
			}
			R::SettingChanged { key, value } => {
				self.notifier.publish(BroadcastEvent::SettingChanged { key, value });
				ControlResponse::unit()
			}
			R::OpenUrlInBrowser { url } => {
				self.notifier.publish(BroadcastEvent::NavigateTo { url });
				ControlResponse::unit()
			}

			R::ExtensionsList => {
				let profile = self.profiles.current_id()?;
				let store = self.stores.profile_store(&profile)?;
				ControlResponse::ok(self.extension_registry(&store, &profile).list())
			}
			R::ExtensionsInstall { .. } => {
				return Err(Error::invalid("extension installs must go through the async control handle"));
			}
			R::ExtensionsRemove { extension_id } => {
				let profile_id = self.profiles.current_id()?;
				let store = self.stores.profile_store(&profile_id)?;
				let removed = self.extension_registry(&store, &profile_id).remove(&extension_id)?;
				if removed {
					self.notifier.publish(BroadcastEvent::ExtensionsChanged { profile_id });
				}
				ControlResponse::ok(removed)
			}
			R::ExtensionsPinnedGet => {
				let profile = self.profiles.current_id()?;
				let store = self.stores.profile_store(&profile)?;
				ControlResponse::ok(self.extension_registry(&store, &profile).pinned())
			}
			R::ExtensionsPinnedSet { ids } => {
				let profile_id = self.profiles.current_id()?;
				let store = self.stores.profile_store(&profile_id)?;
				let ids = self.extension_registry(&store, &profile_id).set_pinned(ids)?;
				self.notifier.publish(BroadcastEvent::ExtensionsPinnedChanged {
					profile_id,
					ids: ids.clone(),
				});
				ControlResponse::ok(ids)
			}
			R::ExtensionsAction { extension_id } => {
				let profile = self.profiles.current_id()?;
				let store = self.stores.profile_store(&profile)?;
				ControlResponse::ok(self.extension_registry(&store, &profile).action(&extension_id))
			}
		})
	}

	/// Makes `profile_id` current and tells every window to reload. The
	/// partition is realized first; if that fails the current profile stays
	/// as it was.
	pub fn switch_profile(&mut self, profile_id: &str) -> Result<bool> {
		if !self.profiles.exists(profile_id)? {
			warn!(target = "blynx.profiles", id = profile_id, "switch to unknown profile");
			return Ok(false);
		}
		self.activate(profile_id)?;
		if !self.profiles.switch(profile_id)? {
			return Ok(false);
		}
		self.notifier.publish(BroadcastEvent::ProfileChanged {
			profile_id: profile_id.to_string(),
		});
		Ok(true)
	}

	/// Removes a profile; removing the current one switches to `default`.
	pub fn remove_profile(&mut self, profile_id: &str) -> Result<bool> {
		let was_current = self.profiles.current_id()? == profile_id;
		let removed = self.profiles.remove(profile_id)?;
		if removed && was_current {
			self.switch_profile(DEFAULT_PROFILE)?;
		}
		Ok(removed)
	}

	/// Realizes the profile's partition and loads its extensions the first
	/// time the partition is activated.
	fn activate(&mut self, profile_id: &str) -> Result<()> {
		let partition = self.sessions.ensure(self.host.as_ref(), profile_id)?;
		if !self.sessions.claim_extension_load(&partition) {
			return Ok(());
		}
		let store = self.stores.profile_store(profile_id)?;
		for extension in self.extension_registry(&store, profile_id).list() {
			if let Err(err) = self.host.load_extension(&partition, &extension) {
				warn!(target = "blynx.extensions", id = %extension.id, error = %err, "failed to load extension");
			}
		}
		Ok(())
	}

	/// Captures where an install for the current profile goes.
	pub fn plan_install(&self, source: ExtensionSource, extension_id: Option<String>) -> Result<(String, InstallPlan)> {
		let profile_id = self.profiles.current_id()?;
		let plan = InstallPlan {
			source,
			extension_id,
			extensions_dir: self.extensions_dir(&profile_id),
		};
		Ok((profile_id, plan))
	}

	/// Records a finished install and announces it.
	pub fn finish_install(&mut self, profile_id: &str, result: Result<InstalledExtension>) -> InstallOutcome {
		let extension = match result {
			Ok(extension) => extension,
			Err(err) => {
				warn!(target = "blynx.extensions", profile = profile_id, error = %err, "extension install failed");
				return InstallOutcome::failed(err.to_string());
			}
		};
		let recorded = self
			.stores
			.profile_store(profile_id)
			.and_then(|store| self.extension_registry(&store, profile_id).record(&extension));
		if let Err(err) = recorded {
			return InstallOutcome::failed(err.to_string());
		}

		let partition = crate::profiles::partition_for(profile_id);
		if self.sessions.is_realized(&partition) {
			if let Err(err) = self.host.load_extension(&partition, &extension) {
				warn!(target = "blynx.extensions", id = %extension.id, error = %err, "failed to load extension");
			}
		}
		self.notifier.publish(BroadcastEvent::ExtensionsChanged {
			profile_id: profile_id.to_string(),
		});
		InstallOutcome::installed(extension)
	}

	fn extension_registry<'s>(&self, store: &'s crate::store::KeyedStore, profile_id: &str) -> ExtensionRegistry<'s> {
		ExtensionRegistry::new(store, self.extensions_dir(profile_id))
	}

	fn extensions_dir(&self, profile_id: &str) -> PathBuf {
		self.stores.profile_dir(profile_id).join(EXTENSIONS_DIR)
	}
}

/// [`ControlContext`] shared by every connection of the daemon.
pub struct SharedControl {
	ctx: tokio::sync::Mutex<ControlContext>,
	installer: ExtensionInstaller,
	notifier: ChangeNotifier,
}

impl SharedControl {
	pub fn new(ctx: ControlContext, installer: ExtensionInstaller) -> Self {
		let notifier = ctx.notifier().clone();
		Self {
			ctx: tokio::sync::Mutex::new(ctx),
			installer,
			notifier,
		}
	}

	pub async fn handle(&self, request: ControlRequest) -> ControlResponse {
		match request {
			ControlRequest::ExtensionsInstall { source, extension_id } => self.install(source, extension_id).await,
			other => self.ctx.lock().await.handle(other),
		}
	}

	/// Plans under the lock, downloads and unpacks without it, then records
	/// the result under the lock again.
	async fn install(&self, source: ExtensionSource, extension_id: Option<String>) -> ControlResponse {
		let planned = self.ctx.lock().await.plan_install(source, extension_id);
		let (profile_id, plan) = match planned {
			Ok(planned) => planned,
			Err(err) => return ControlResponse::ok(InstallOutcome::failed(err.to_string())),
		};
		let result = self.installer.install(plan).await;
		let outcome = self.ctx.lock().await.finish_install(&profile_id, result);
		ControlResponse::ok(outcome)
	}

	pub fn subscribe(&self) -> Subscription {
		self.notifier.subscribe()
	}

	pub fn notifier(&self) -> &ChangeNotifier {
		&self.notifier
	}
}
