use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use itertools::iproduct;

use super::error::AssignError;
use super::network::{Link, Network};

/// A TNTP-format text file: `<TAG> value` metadata lines up to
/// `<END OF METADATA>`, then whitespace-separated data rows.  Lines starting
/// with `~` are comments and blank lines are skipped everywhere.
struct TntpFile {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
}

impl TntpFile {
    fn open(path: &Path) -> Result<TntpFile, AssignError> {
        let file = File::open(path).map_err(|source| AssignError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(TntpFile {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
        });
    }

    fn next_line(&mut self) -> Result<Option<String>, AssignError> {
        match self.lines.next() {
            Some(Ok(line)) => return Ok(Some(line)),
            Some(Err(source)) => {
                return Err(AssignError::Io { path: self.path.clone(), source })
            }
            None => return Ok(None),
        }
    }

    /// Next data line with comments and blanks skipped, or None at EOF.
    fn next_data_line(&mut self) -> Result<Option<String>, AssignError> {
        while let Some(line) = self.next_line()? {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('~') {
                continue;
            }
            return Ok(Some(String::from(trimmed)));
        }
        return Ok(None);
    }

    fn format_err(&self, message: String) -> AssignError {
        return AssignError::Format { path: self.path.clone(), message };
    }

    /// Read `(tag, value)` pairs until `<END OF METADATA>`.  Running out of
    /// input first is fatal.
    fn read_metadata(&mut self) -> Result<Vec<(String, String)>, AssignError> {
        let mut tags = vec![];
        loop {
            let line = match self.next_data_line()? {
                Some(line) => line,
                None => {
                    return Err(self.format_err(String::from(
                        "file ended before metadata complete")));
                }
            };
            let rest = match line.strip_prefix('<') {
                Some(rest) => rest,
                None => {
                    return Err(self.format_err(format!(
                        "expected a metadata tag, got \"{}\"", line)));
                }
            };
            let close = match rest.find('>') {
                Some(close) => close,
                None => {
                    return Err(self.format_err(format!(
                        "metadata tag not closed: \"{}\"", line)));
                }
            };
            let tag = rest[..close].to_uppercase();
            // anything after a ~ on the value side is a comment
            let raw_value = rest[close + 1..].split('~').next().unwrap_or("");
            let value = String::from(raw_value.trim());
            if tag == "END OF METADATA" {
                return Ok(tags);
            }
            tags.push((tag, value));
        }
    }
}

fn parse_field<T: std::str::FromStr>(file: &TntpFile, field: &str, line: &str)
                                     -> Result<T, AssignError> {
    return field.parse().map_err(|_| file.format_err(format!(
        "could not parse \"{}\" in line \"{}\"", field, line)));
}

/// Read a TNTP link file and trip file into a network, converting the
/// 1-based node numbers of the file format to 0-based indices.  All the
/// input-validation failure modes are fatal here, so the solver can assume
/// a well-formed network.
pub fn read_tntp_network(link_path: &Path, trip_path: &Path) -> Result<Network, AssignError> {
    let mut link_file = TntpFile::open(link_path)?;

    let mut num_zones = None;
    let mut num_links = None;
    let mut num_nodes = None;
    let mut first_through_node = None;
    let mut distance_factor = None;
    let mut toll_factor = None;
    for (tag, value) in link_file.read_metadata()? {
        match tag.as_str() {
            "NUMBER OF ZONES" => {
                num_zones = Some(parse_field::<usize>(&link_file, &value, &tag)?);
            }
            "NUMBER OF LINKS" => {
                num_links = Some(parse_field::<usize>(&link_file, &value, &tag)?);
            }
            "NUMBER OF NODES" => {
                num_nodes = Some(parse_field::<usize>(&link_file, &value, &tag)?);
            }
            "FIRST THRU NODE" => {
                // 1-based in the file
                let through: usize = parse_field(&link_file, &value, &tag)?;
                first_through_node = Some(through.saturating_sub(1));
            }
            "DISTANCE FACTOR" => {
                distance_factor = Some(parse_field::<f64>(&link_file, &value, &tag)?);
            }
            "TOLL FACTOR" => {
                toll_factor = Some(parse_field::<f64>(&link_file, &value, &tag)?);
            }
            _ => {
                log::warn!("ignoring unknown metadata tag {} in link file {}",
                           tag, link_path.display());
            }
        }
    }

    let num_zones = match num_zones {
        Some(value) => value,
        None => {
            return Err(link_file.format_err(String::from(
                "link file does not contain number of zones")));
        }
    };
    let num_links = match num_links {
        Some(value) => value,
        None => {
            return Err(link_file.format_err(String::from(
                "link file does not contain number of links")));
        }
    };
    let num_nodes = match num_nodes {
        Some(value) => value,
        None => {
            return Err(link_file.format_err(String::from(
                "link file does not contain number of nodes")));
        }
    };
    let first_through_node = match first_through_node {
        Some(value) => value,
        None => {
            log::warn!("link file {} does not contain first through node, \
                        setting to 1 as default", link_path.display());
            0
        }
    };
    if num_zones < 1 || num_nodes < 1 || num_links < 1 {
        return Err(link_file.format_err(format!(
            "zone, node and link counts must be positive (got {}, {}, {})",
            num_zones, num_nodes, num_links)));
    }
    if num_zones > num_nodes {
        return Err(link_file.format_err(format!(
            "{} zones but only {} nodes; zones occupy the first node indices",
            num_zones, num_nodes)));
    }

    let mut network = Network::new(num_nodes, num_zones, first_through_node);

    let mut links_read = 0;
    while links_read < num_links {
        let line = match link_file.next_data_line()? {
            Some(line) => line,
            None => {
                return Err(link_file.format_err(String::from(
                    "link file ended before link data complete")));
            }
        };
        let (tail, head, link) = parse_link_row(&link_file, &line, num_nodes)?;
        network.add_link(tail, head, link);
        links_read += 1;
    }

    read_trip_file(trip_path, &mut network, distance_factor.unwrap_or(0.0),
                   toll_factor.unwrap_or(0.0))?;
    network.log_summary();
    return Ok(network);
}

/// One body row of the link file: ten whitespace-separated fields, with node
/// numbers converted to 0-based on return.
fn parse_link_row(file: &TntpFile, line: &str, num_nodes: usize)
                  -> Result<(usize, usize, Link), AssignError> {
    let cleaned = line.trim_end_matches(';').trim();
    let fields: Vec<&str> = cleaned.split_whitespace().collect();
    if fields.len() < 10 {
        return Err(file.format_err(format!(
            "link row needs 10 fields, got {}: \"{}\"", fields.len(), line)));
    }

    let tail: usize = parse_field(file, fields[0], line)?;
    let head: usize = parse_field(file, fields[1], line)?;
    let capacity: f64 = parse_field(file, fields[2], line)?;
    let length: f64 = parse_field(file, fields[3], line)?;
    let free_flow_time: f64 = parse_field(file, fields[4], line)?;
    let alpha: f64 = parse_field(file, fields[5], line)?;
    let beta: f64 = parse_field(file, fields[6], line)?;
    let speed_limit: f64 = parse_field(file, fields[7], line)?;
    let toll: f64 = parse_field(file, fields[8], line)?;
    let link_type: i32 = parse_field(file, fields[9], line)?;

    if tail < 1 || tail > num_nodes {
        return Err(file.format_err(format!("link tail {} out of range", tail)));
    }
    if head < 1 || head > num_nodes {
        return Err(file.format_err(format!("link head {} out of range", head)));
    }
    if capacity <= 0.0 {
        return Err(file.format_err(format!(
            "link ({},{}) has nonpositive capacity {}", tail, head, capacity)));
    }
    if free_flow_time < 0.0 {
        return Err(file.format_err(format!(
            "link ({},{}) has negative free flow time {}", tail, head, free_flow_time)));
    }
    if alpha < 0.0 || beta < 0.0 {
        return Err(file.format_err(format!(
            "link ({},{}) has negative BPR parameters", tail, head)));
    }
    if length < 0.0 {
        log::warn!("link ({},{}) has negative length {}", tail, head, length);
    }
    if speed_limit < 0.0 {
        log::warn!("link ({},{}) has negative speed limit {}", tail, head, speed_limit);
    }
    if toll < 0.0 {
        log::warn!("link ({},{}) has negative toll {}", tail, head, toll);
    }

    let link = Link::new(capacity, length, free_flow_time, alpha, beta, speed_limit,
                         toll, link_type);
    return Ok((tail - 1, head - 1, link));
}

/// Read the trip file into the network's demand matrix, then finalize the
/// network with the effective cost factors (the trip file may override the
/// link file's defaults).
fn read_trip_file(trip_path: &Path, network: &mut Network, default_distance_factor: f64,
                  default_toll_factor: f64) -> Result<(), AssignError> {
    let num_zones = network.num_zones();
    let mut trip_file = TntpFile::open(trip_path)?;

    let mut total_od_flow = None;
    let mut distance_factor = default_distance_factor;
    let mut toll_factor = default_toll_factor;
    for (tag, value) in trip_file.read_metadata()? {
        match tag.as_str() {
            "NUMBER OF ZONES" => {
                let check: usize = parse_field(&trip_file, &value, &tag)?;
                if check != num_zones {
                    return Err(trip_file.format_err(format!(
                        "number of zones in trip and link files do not match \
                         ({} vs {})", check, num_zones)));
                }
            }
            "TOTAL OD FLOW" => {
                total_od_flow = Some(parse_field::<f64>(&trip_file, &value, &tag)?);
            }
            "DISTANCE FACTOR" => {
                distance_factor = parse_field(&trip_file, &value, &tag)?;
            }
            "TOLL FACTOR" => {
                toll_factor = parse_field(&trip_file, &value, &tag)?;
            }
            _ => {
                log::warn!("ignoring unknown metadata tag {} in trip file {}",
                           tag, trip_path.display());
            }
        }
    }

    // body: "Origin r" lines switch the current origin, and "dest : demand ;"
    // entries fill its row of the matrix
    let mut origin: Option<usize> = None;
    while let Some(line) = trip_file.next_data_line()? {
        if let Some(value) = line.strip_prefix("Origin") {
            let file_origin: usize = parse_field(&trip_file, value.trim(), &line)?;
            if file_origin < 1 || file_origin > num_zones {
                return Err(trip_file.format_err(format!(
                    "origin {} out of range", file_origin)));
            }
            origin = Some(file_origin - 1);
            continue;
        }

        let current_origin = match origin {
            Some(current_origin) => current_origin,
            None => {
                return Err(trip_file.format_err(format!(
                    "demand entry before any Origin line: \"{}\"", line)));
            }
        };
        for token in line.split(';') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let parts: Vec<&str> = token.split(':').collect();
            if parts.len() != 2 {
                return Err(trip_file.format_err(format!(
                    "expected \"dest : demand\", got \"{}\"", token)));
            }
            let dest: usize = parse_field(&trip_file, parts[0].trim(), token)?;
            let demand: f64 = parse_field(&trip_file, parts[1].trim(), token)?;
            if dest < 1 || dest > num_zones {
                return Err(trip_file.format_err(format!(
                    "destination {} out of range", dest)));
            }
            if demand < 0.0 {
                return Err(AssignError::NegativeDemand {
                    origin: current_origin + 1,
                    dest,
                });
            }
            network.set_demand(current_origin, dest - 1, demand);
        }
    }

    let mut total_demand = 0.0;
    for (rr, ss) in iproduct!(0..num_zones, 0..num_zones) {
        total_demand += network.demand(rr, ss);
    }
    if let Some(declared) = total_od_flow {
        if (declared - total_demand).abs() > 1e-6 * declared.abs().max(1.0) {
            log::warn!("trip file {} declares total OD flow {} but entries sum to {}",
                       trip_path.display(), declared, total_demand);
        }
    }

    network.finalize(distance_factor, toll_factor, total_od_flow.unwrap_or(total_demand));
    return Ok(());
}
