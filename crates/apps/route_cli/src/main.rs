mod azure;

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use foundation::math::LonLat;
use planner::{
    channels, PlannerConfig, RoutePlanner, RoutingBackend, SearchBackend, SearchClient, SlotState,
    VehicleCategory, VehicleProfile, WaypointKey,
};
use scene::{GeoJsonFeature, RawFeature, ShapeMetadataCache};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::azure::AzureMaps;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-stop route planning against Azure Maps")]
struct Args {
    /// Azure Maps subscription key (default: AZURE_MAPS_KEY)
    #[arg(long)]
    key: Option<String>,

    /// Planner settings as JSON; ROUTE_PLANNER_* variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Azure Maps REST base URL
    #[arg(long, default_value = azure::DEFAULT_BASE_URL)]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Geocode the stops, route through them and print the route details
    Route {
        /// Stops in order: start, intermediates, end
        #[arg(required = true, num_args = 2..)]
        stops: Vec<String>,

        /// Vehicle category JSON (vehicleLength, vehicleType, ...)
        #[arg(long)]
        vehicle: Option<PathBuf>,

        /// Also list parking along the computed route
        #[arg(long)]
        along: bool,
    },

    /// Address search biased to a position
    Search {
        query: String,

        /// Bias position: lon,lat (default: configured map center)
        #[arg(long, value_parser = parse_position)]
        near: Option<LonLat>,
    },

    /// Category search around lon,lat
    Poi {
        #[arg(value_parser = parse_position)]
        position: LonLat,
    },

    /// Address at lon,lat
    Reverse {
        #[arg(value_parser = parse_position)]
        position: LonLat,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let key = args
        .key
        .or_else(|| env::var("AZURE_MAPS_KEY").ok())
        .ok_or("missing Azure Maps key (--key or AZURE_MAPS_KEY)")?;
    let config = match &args.config {
        Some(path) => PlannerConfig::from_json(&fs::read_to_string(path)?)?,
        None => PlannerConfig::default(),
    }
    .apply_env();

    let maps = Arc::new(AzureMaps::new(key).with_base_url(args.base_url));

    match args.command {
        Command::Route {
            stops,
            vehicle,
            along,
        } => plan_route(maps, config, &stops, vehicle, along).await?,
        Command::Search { query, near } => {
            let bias = near.unwrap_or(config.default_center);
            let client = SearchClient::new(maps, Arc::new(config));
            print_features(client.search_address(query, bias).await?);
        }
        Command::Poi { position } => {
            let client = SearchClient::new(maps, Arc::new(config));
            print_features(client.search_poi(position).await?);
        }
        Command::Reverse { position } => {
            let client = SearchClient::new(maps, Arc::new(config));
            print_features(client.reverse_geocode(position).await?);
        }
    }

    Ok(())
}

async fn plan_route(
    maps: Arc<AzureMaps>,
    config: PlannerConfig,
    stops: &[String],
    vehicle: Option<PathBuf>,
    along: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (state, publisher, _location, vehicles) = channels();
    if let Some(path) = vehicle {
        let category: VehicleCategory = serde_json::from_str(&fs::read_to_string(path)?)?;
        info!(vehicle = %category.category_name, "vehicle selected");
        vehicles.select(Some(VehicleProfile::from(&category)));
    }

    let routing: Arc<dyn RoutingBackend> = maps.clone();
    let search: Arc<dyn SearchBackend> = maps;
    let mut planner = RoutePlanner::new(config, routing, search, state, publisher);

    let last = stops.len() - 1;
    for (i, stop) in stops.iter().enumerate() {
        let key = match i {
            0 => WaypointKey::Start,
            i if i == last => WaypointKey::End,
            i => planner.insert_intermediate((i - 1).checked_sub(1)),
        };
        planner.set_query(key, stop);
        planner.search_address(key).await;

        if planner.slot_state(key) == SlotState::Ambiguous {
            // Take the best-ranked hit.
            let first = planner
                .results()
                .candidates(key)
                .iter()
                .find(|c| !c.is_cluster())
                .and_then(|c| c.id.clone());
            match first {
                Some(id) => {
                    warn!(%key, stop = %stop, "several matches, using the first");
                    planner.select_candidate(key, &id);
                }
                None => return Err(format!("no match for \"{stop}\"").into()),
            }
        }
    }

    let route = planner.compute_route().await?;
    info!(
        legs = route.legs.len(),
        meters = route.summary.length_in_meters,
        "route computed"
    );
    if let Some(details) = planner.route_details() {
        println!("{}", details.to_json_pretty()?);
    }

    if along {
        for hit in planner.search_along_route().await {
            let title = hit.display_title().unwrap_or("?");
            match hit.point() {
                Some([lon, lat]) => println!("{title}\t{lat:.6},{lon:.6}"),
                None => println!("{title}"),
            }
        }
    }

    for event in planner.drain_events() {
        debug!(?event, "planner event");
    }
    let metrics = planner.metrics().snapshot();
    debug!(?metrics, "planner metrics");
    Ok(())
}

fn print_features(features: Vec<GeoJsonFeature>) {
    for feature in features {
        let meta = ShapeMetadataCache::normalize(&RawFeature::from(feature));
        let title = meta
            .display_title()
            .map(str::to_string)
            .or_else(|| meta.location_text())
            .unwrap_or_else(|| "?".to_string());
        match meta.point() {
            Some([lon, lat]) => println!("{title}\t{lat:.6},{lon:.6}"),
            None => println!("{title}"),
        }
    }
}

/// `lon,lat`
fn parse_position(s: &str) -> Result<LonLat, String> {
    let (lon, lat) = s
        .split_once(',')
        .ok_or_else(|| format!("expected lon,lat, got \"{s}\""))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("invalid longitude: {e}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("invalid latitude: {e}"))?;
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(format!("position out of range: {s}"));
    }
    Ok([lon, lat])
}
