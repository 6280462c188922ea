// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::{Path, PathBuf};

use crate::{
    config::ChunkCount,
    types::{ChunkSpec, DownloadTarget},
};

/// Calculate inclusive chunk boundaries covering `[0, file_size)`.
///
/// Every chunk is `file_size / num_chunks` bytes long except the last,
/// which absorbs the remainder. When the file is smaller than the
/// requested count the count is reduced so no chunk is empty.
#[must_use]
pub fn calculate_chunk_boundaries(file_size: u64, num_chunks: usize) -> Vec<(u64, u64)> {
    if num_chunks == 0 || file_size == 0 {
        return Vec::new();
    }

    let num_chunks = (num_chunks as u64).min(file_size);
    let chunk_size = file_size / num_chunks;

    (0..num_chunks)
        .map(|i| {
            let start = i * chunk_size;
            let end = if i == num_chunks - 1 {
                file_size - 1
            } else {
                (i + 1) * chunk_size - 1
            };
            (start, end)
        })
        .collect()
}

/// Temp file for chunk `id` of `output_path`: `<output>.part<id>`
#[must_use]
pub fn chunk_temp_path(output_path: &Path, id: usize) -> PathBuf {
    let mut name = output_path.as_os_str().to_owned();
    name.push(format!(".part{id}"));
    PathBuf::from(name)
}

/// Plan the chunks of `target`, each writing next to `output_path`
#[must_use]
pub fn plan_chunks(
    target: &DownloadTarget,
    output_path: &Path,
    chunk_count: ChunkCount,
) -> Vec<ChunkSpec> {
    calculate_chunk_boundaries(target.total_size, chunk_count.get())
        .into_iter()
        .enumerate()
        .map(|(id, (start, end))| ChunkSpec {
            id,
            start,
            end,
            temp_path: chunk_temp_path(output_path, id),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(total_size: u64) -> DownloadTarget {
        DownloadTarget {
            url: "https://example.com/video".to_string(),
            total_size,
        }
    }

    #[test]
    fn test_calculate_chunk_boundaries() {
        let boundaries = calculate_chunk_boundaries(1000, 4);
        assert_eq!(boundaries.len(), 4);
        assert_eq!(boundaries[0], (0, 249));
        assert_eq!(boundaries[1], (250, 499));
        assert_eq!(boundaries[2], (500, 749));
        assert_eq!(boundaries[3], (750, 999));
    }

    #[test]
    fn test_calculate_chunk_boundaries_single() {
        let boundaries = calculate_chunk_boundaries(1000, 1);
        assert_eq!(boundaries, vec![(0, 999)]);
    }

    #[test]
    fn test_last_chunk_absorbs_remainder() {
        // 1003 / 4 = 250 rem 3
        let boundaries = calculate_chunk_boundaries(1003, 4);
        assert_eq!(boundaries[2], (500, 749));
        assert_eq!(boundaries[3], (750, 1002));
    }

    #[test]
    fn test_partition_is_contiguous_and_exhaustive() {
        for size in [1u64, 7, 31, 32, 33, 100, 1000, 4097, 65_537] {
            for n in ChunkCount::MIN..=ChunkCount::MAX {
                let boundaries = calculate_chunk_boundaries(size, n);
                let expected_chunks = usize::try_from(size).map_or(n, |s| n.min(s));
                assert_eq!(boundaries.len(), expected_chunks, "size={size} n={n}");

                let mut next = 0;
                for &(start, end) in &boundaries {
                    assert_eq!(start, next, "gap or overlap at size={size} n={n}");
                    assert!(end >= start);
                    next = end + 1;
                }
                assert_eq!(next, size);

                // Only the final chunk may be longer than the others
                let base = size / boundaries.len() as u64;
                for &(start, end) in &boundaries[..boundaries.len() - 1] {
                    assert_eq!(end - start + 1, base);
                }
                let &(start, end) = boundaries.last().unwrap();
                assert_eq!(end - start + 1, base + size % boundaries.len() as u64);
            }
        }
    }

    #[test]
    fn test_small_file_caps_chunk_count() {
        let boundaries = calculate_chunk_boundaries(3, 8);
        assert_eq!(boundaries, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_empty_file_has_no_chunks() {
        assert!(calculate_chunk_boundaries(0, 8).is_empty());
        assert!(calculate_chunk_boundaries(100, 0).is_empty());
    }

    #[test]
    fn test_plan_chunks_800_bytes_into_4() {
        let chunks = plan_chunks(&target(800), Path::new("/tmp/out/video.tmp"), ChunkCount::new(4));
        let ranges: Vec<_> = chunks.iter().map(|c| (c.id, c.start, c.end)).collect();
        assert_eq!(
            ranges,
            vec![(0, 0, 199), (1, 200, 399), (2, 400, 599), (3, 600, 799)]
        );
        assert!(chunks.iter().all(|c| c.len() == 200));
        assert_eq!(chunks[2].temp_path, PathBuf::from("/tmp/out/video.tmp.part2"));
        assert_eq!(chunks[0].range().header_value(), "bytes=0-199");
    }

    #[test]
    fn test_chunk_temp_path_keeps_extension() {
        assert_eq!(
            chunk_temp_path(Path::new("abc_audio.tmp"), 11),
            PathBuf::from("abc_audio.tmp.part11")
        );
    }
}
